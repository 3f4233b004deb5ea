//! Comment colors

/// An RGB color decoded from the packed 24-bit value used by comment services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Plain white, the color most comments are posted with
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    /// Creates a color from its components
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decodes a packed `0xRRGGBB` integer
    pub fn from_packed(packed: u32) -> Self {
        Self {
            r: (packed / 65536 % 256) as u8,
            g: (packed % 65536 / 256) as u8,
            b: (packed % 256) as u8,
        }
    }

    /// Formats the color as an ASS `&HBBGGRR&` color tag value
    pub fn to_ass(self) -> String {
        format!("&H{:02X}{:02X}{:02X}&", self.b, self.g, self.r)
    }
}
