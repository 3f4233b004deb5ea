//! [`PlayerHost`] implementation on top of the mpv client API

use crate::mpv_bindings::*;
use danmaku_player::{Error, HostEvent, PlayerHost, Result, Wakeup};
use libc::{c_char, c_int, c_void};
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

/// Overlay id used for all comment markup
const OVERLAY_ID: &str = "0";

/// Client handle given to the plugin by mpv
pub struct MpvHost {
    handle: *mut mpv_handle,
    api: MpvApi,
}

struct MpvWaker {
    handle: *mut mpv_handle,
    wakeup: unsafe extern "C" fn(*mut mpv_handle),
}

// SAFETY: mpv_wakeup may be called from any thread for as long as the
// client handle lives, which outlasts the plugin's runtime.
unsafe impl Send for MpvWaker {}
unsafe impl Sync for MpvWaker {}

impl Wakeup for MpvWaker {
    fn wake(&self) {
        unsafe { (self.wakeup)(self.handle) }
    }
}

impl MpvHost {
    /// Wraps the handle passed to `mpv_open_cplugin`
    ///
    /// # Safety
    ///
    /// `handle` must be the live client handle mpv passed to the plugin.
    pub unsafe fn new(handle: *mut mpv_handle, api: MpvApi) -> Self {
        Self { handle, api }
    }

    /// Name mpv assigned to this client (the plugin file stem)
    pub fn client_name(&self) -> String {
        unsafe { CStr::from_ptr((self.api.client_name)(self.handle)) }
            .to_string_lossy()
            .into_owned()
    }

    /// Asks mpv to send property change events for `name`
    pub fn observe(&self, name: &str) -> Result<()> {
        let name = c_string(name)?;
        self.check(unsafe {
            (self.api.observe_property)(self.handle, 0, name.as_ptr(), MPV_FORMAT_NONE)
        })
    }

    /// Expands an mpv path such as `~~/script-opts/x.conf`
    pub fn expand_path(&self, path: &str) -> Result<String> {
        let args = [c_string("expand-path")?, c_string(path)?];
        let mut argv = argv(&args);
        let mut node: mpv_node = unsafe { std::mem::zeroed() };
        self.check(unsafe { (self.api.command_ret)(self.handle, argv.as_mut_ptr(), &mut node) })?;

        let expanded = if node.format == MPV_FORMAT_STRING {
            Ok(unsafe { CStr::from_ptr(node.u.string) }
                .to_string_lossy()
                .into_owned())
        } else {
            Err(Error::Host(format!("expand-path returned format {}", node.format)))
        };
        unsafe { (self.api.free_node_contents)(&mut node) };
        expanded
    }

    fn command(&self, args: &[&str]) -> Result<()> {
        let args = args.iter().map(|arg| c_string(arg)).collect::<Result<Vec<_>>>()?;
        let mut argv = argv(&args);
        self.check(unsafe { (self.api.command)(self.handle, argv.as_mut_ptr()) })
    }

    fn get_property<T>(&self, name: &str, format: mpv_format, data: &mut T) -> Result<()> {
        let name = c_string(name)?;
        self.check(unsafe {
            (self.api.get_property)(
                self.handle,
                name.as_ptr(),
                format,
                data as *mut T as *mut c_void,
            )
        })
    }

    fn check(&self, code: c_int) -> Result<()> {
        if code >= 0 {
            return Ok(());
        }
        let message = unsafe { CStr::from_ptr((self.api.error_string)(code)) };
        Err(Error::Host(message.to_string_lossy().into_owned()))
    }

    unsafe fn translate(&self, event: &mpv_event) -> HostEvent {
        match event.event_id {
            MPV_EVENT_SHUTDOWN => HostEvent::Shutdown,
            MPV_EVENT_FILE_LOADED => HostEvent::FileLoaded,
            MPV_EVENT_SEEK => HostEvent::Seek,
            MPV_EVENT_PROPERTY_CHANGE if !event.data.is_null() => {
                let property = &*(event.data as *const mpv_event_property);
                HostEvent::PropertyChange(lossy(property.name))
            }
            MPV_EVENT_CLIENT_MESSAGE if !event.data.is_null() => {
                let message = &*(event.data as *const mpv_event_client_message);
                let count = usize::try_from(message.num_args).unwrap_or_default();
                let args = if count == 0 || message.args.is_null() {
                    Vec::new()
                } else {
                    std::slice::from_raw_parts(message.args, count)
                        .iter()
                        .map(|&arg| lossy(arg))
                        .collect()
                };
                HostEvent::ClientMessage(args)
            }
            _ => HostEvent::Idle,
        }
    }
}

impl PlayerHost for MpvHost {
    fn wait_event(&mut self, timeout: Option<Duration>) -> HostEvent {
        let timeout = timeout.map_or(-1.0, |t| t.as_secs_f64());
        let event = unsafe { (self.api.wait_event)(self.handle, timeout) };
        if event.is_null() {
            return HostEvent::Idle;
        }
        unsafe { self.translate(&*event) }
    }

    fn flag(&self, name: &str) -> Result<bool> {
        let mut value: c_int = 0;
        self.get_property(name, MPV_FORMAT_FLAG, &mut value)?;
        Ok(value != 0)
    }

    fn double(&self, name: &str) -> Result<f64> {
        let mut value = 0f64;
        self.get_property(name, MPV_FORMAT_DOUBLE, &mut value)?;
        Ok(value)
    }

    fn string(&self, name: &str) -> Result<String> {
        let mut value: *mut c_char = ptr::null_mut();
        self.get_property(name, MPV_FORMAT_STRING, &mut value)?;
        if value.is_null() {
            return Err(Error::PropertyUnavailable(name.to_string()));
        }
        let text = lossy(value);
        unsafe { (self.api.free)(value as *mut c_void) };
        Ok(text)
    }

    fn show_text(&self, text: &str) -> Result<()> {
        self.command(&["show-text", text])
    }

    fn set_overlay(&self, markup: &str, width: i64, height: i64) -> Result<()> {
        let (width, height) = (width.to_string(), height.to_string());
        self.command(&["osd-overlay", OVERLAY_ID, "ass-events", markup, &width, &height])
    }

    fn remove_overlay(&self) -> Result<()> {
        self.command(&["osd-overlay", OVERLAY_ID, "none", ""])
    }

    fn waker(&self) -> Arc<dyn Wakeup> {
        Arc::new(MpvWaker {
            handle: self.handle,
            wakeup: self.api.wakeup,
        })
    }
}

fn c_string(text: &str) -> Result<CString> {
    CString::new(text).map_err(|e| Error::Host(format!("argument contains NUL: {e}")))
}

/// Builds a NULL terminated argument vector borrowing from `args`
fn argv(args: &[CString]) -> Vec<*const c_char> {
    args.iter()
        .map(|arg| arg.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect()
}

fn lossy(text: *const c_char) -> String {
    if text.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
}
