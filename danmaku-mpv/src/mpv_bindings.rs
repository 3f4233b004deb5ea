//! mpv client API bindings
//!
//! Manual bindings for the subset of `mpv/client.h` the plugin uses. Function
//! pointers are not linked: mpv fills every exported `pfn_mpv_*` symbol when
//! it loads a C plugin, and [`MpvApi::load`] collects them at startup.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(dead_code)]

use libc::{c_char, c_int, c_void};

// Opaque types
pub enum mpv_handle {}

// Value formats
pub type mpv_format = c_int;
pub const MPV_FORMAT_NONE: mpv_format = 0;
pub const MPV_FORMAT_STRING: mpv_format = 1;
pub const MPV_FORMAT_FLAG: mpv_format = 3;
pub const MPV_FORMAT_DOUBLE: mpv_format = 5;

// Event ids
pub type mpv_event_id = c_int;
pub const MPV_EVENT_SHUTDOWN: mpv_event_id = 1;
pub const MPV_EVENT_FILE_LOADED: mpv_event_id = 8;
pub const MPV_EVENT_CLIENT_MESSAGE: mpv_event_id = 16;
pub const MPV_EVENT_SEEK: mpv_event_id = 20;
pub const MPV_EVENT_PROPERTY_CHANGE: mpv_event_id = 22;

#[repr(C)]
pub struct mpv_event {
    pub event_id: mpv_event_id,
    pub error: c_int,
    pub reply_userdata: u64,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct mpv_event_property {
    pub name: *const c_char,
    pub format: mpv_format,
    pub data: *mut c_void,
}

#[repr(C)]
pub struct mpv_event_client_message {
    pub num_args: c_int,
    pub args: *mut *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union mpv_node_value {
    pub string: *mut c_char,
    pub flag: c_int,
    pub int64: i64,
    pub double_: f64,
    pub list: *mut c_void,
    pub ba: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct mpv_node {
    pub u: mpv_node_value,
    pub format: mpv_format,
}

macro_rules! mpv_functions {
    ($($field:ident => $symbol:ident: fn($($arg:ty),*) $(-> $ret:ty)?;)*) => {
        $(
            #[no_mangle]
            pub static mut $symbol: Option<unsafe extern "C" fn($($arg),*) $(-> $ret)?> = None;
        )*

        /// mpv entry points resolved from the `pfn_mpv_*` table
        #[derive(Clone, Copy)]
        pub struct MpvApi {
            $(pub $field: unsafe extern "C" fn($($arg),*) $(-> $ret)?,)*
        }

        impl MpvApi {
            /// Collects the function pointers filled in by mpv, returning the
            /// name of the first missing one on failure
            pub fn load() -> Result<Self, &'static str> {
                // SAFETY: mpv writes the table before calling the plugin entry
                // point and never touches it afterwards.
                unsafe {
                    Ok(Self {
                        $($field: $symbol.ok_or(stringify!($symbol))?,)*
                    })
                }
            }
        }
    };
}

mpv_functions! {
    error_string => pfn_mpv_error_string: fn(c_int) -> *const c_char;
    free => pfn_mpv_free: fn(*mut c_void);
    client_name => pfn_mpv_client_name: fn(*mut mpv_handle) -> *const c_char;
    command => pfn_mpv_command: fn(*mut mpv_handle, *mut *const c_char) -> c_int;
    command_ret => pfn_mpv_command_ret: fn(*mut mpv_handle, *mut *const c_char, *mut mpv_node) -> c_int;
    free_node_contents => pfn_mpv_free_node_contents: fn(*mut mpv_node);
    get_property => pfn_mpv_get_property: fn(*mut mpv_handle, *const c_char, mpv_format, *mut c_void) -> c_int;
    observe_property => pfn_mpv_observe_property: fn(*mut mpv_handle, u64, *const c_char, mpv_format) -> c_int;
    wait_event => pfn_mpv_wait_event: fn(*mut mpv_handle, f64) -> *mut mpv_event;
    wakeup => pfn_mpv_wakeup: fn(*mut mpv_handle);
}
