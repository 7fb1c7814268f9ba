//! Mouse and keyboard input for the macro.
//!
//! The macro talks to an [`InputDriver`]. On Windows, [`SendInputDriver`]
//! simulates hardware-level input, which moves the real cursor. Everywhere
//! else (and with `--dry-run`) [`DryRunInput`] only logs what it would do.

use anyhow::Result;

/// Primitive input commands used by the macro.
pub trait InputDriver: Send + Sync {
    /// Moves to a screen point and holds the left button down.
    fn press_hold(&self, x: i32, y: i32) -> Result<()>;
    /// Releases the left button.
    fn release(&self) -> Result<()>;
    /// Moves to a screen point and clicks.
    fn click(&self, x: i32, y: i32) -> Result<()>;
    /// Presses and releases a named key.
    fn tap_key(&self, key: &str) -> Result<()>;
}

/// Logs every command without touching real input.
#[derive(Debug, Default)]
pub struct DryRunInput;

impl InputDriver for DryRunInput {
    fn press_hold(&self, x: i32, y: i32) -> Result<()> {
        crate::log(&format!("[dry-run] hold at ({}, {})", x, y));
        Ok(())
    }

    fn release(&self) -> Result<()> {
        crate::log("[dry-run] release");
        Ok(())
    }

    fn click(&self, x: i32, y: i32) -> Result<()> {
        crate::log(&format!("[dry-run] click at ({}, {})", x, y));
        Ok(())
    }

    fn tap_key(&self, key: &str) -> Result<()> {
        crate::log(&format!("[dry-run] key '{}'", key));
        Ok(())
    }
}

/// Maps a key name from settings.json to a Windows virtual-key code.
///
/// Single letters and digits map to themselves; a handful of named keys
/// are supported. Names are case-insensitive.
pub fn virtual_key_code(name: &str) -> Option<u16> {
    let name = name.trim().to_lowercase();
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(c.to_ascii_uppercase() as u16);
        }
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
        if (1..=12).contains(&n) {
            return Some(0x70 + n - 1);
        }
    }

    let code = match name.as_str() {
        "backspace" => 0x08,
        "tab" => 0x09,
        "enter" | "return" => 0x0D,
        "shift" => 0x10,
        "ctrl" | "control" => 0x11,
        "alt" => 0x12,
        "esc" | "escape" => 0x1B,
        "space" => 0x20,
        "left" => 0x25,
        "up" => 0x26,
        "right" => 0x27,
        "down" => 0x28,
        _ => return None,
    };
    Some(code)
}

#[cfg(windows)]
pub use send_input::SendInputDriver;

#[cfg(windows)]
mod send_input {
    use anyhow::{anyhow, Result};
    use std::time::Duration;

    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
        MOUSEEVENTF_MOVE, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    use super::{virtual_key_code, InputDriver};

    /// Simulated hardware input via `SendInput`.
    ///
    /// WARNING: this moves the actual cursor. The game must be in the
    /// foreground.
    #[derive(Debug, Default)]
    pub struct SendInputDriver;

    /// Normalizes screen pixels to the 0-65535 range MOUSEEVENTF_ABSOLUTE expects.
    fn normalize(x: i32, y: i32) -> (i32, i32) {
        let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) }.max(1);
        let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) }.max(1);
        let norm_x = ((x as i64 * 65535) / screen_width as i64) as i32;
        let norm_y = ((y as i64 * 65535) / screen_height as i64) as i32;
        (norm_x, norm_y)
    }

    fn send(inputs: &[INPUT]) -> Result<()> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(anyhow!(
                "SendInput sent {} of {} events",
                sent,
                inputs.len()
            ));
        }
        Ok(())
    }

    fn mouse(x: i32, y: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
        let (dx, dy) = normalize(x, y);
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                    ..Default::default()
                },
            },
        }
    }

    fn key(code: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(code),
                    dwFlags: flags,
                    ..Default::default()
                },
            },
        }
    }

    impl InputDriver for SendInputDriver {
        fn press_hold(&self, x: i32, y: i32) -> Result<()> {
            send(&[mouse(x, y, MOUSE_EVENT_FLAGS(0))])?;
            std::thread::sleep(Duration::from_millis(50));
            send(&[mouse(x, y, MOUSEEVENTF_LEFTDOWN)])
        }

        fn release(&self) -> Result<()> {
            let input = INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dwFlags: MOUSEEVENTF_LEFTUP,
                        ..Default::default()
                    },
                },
            };
            send(&[input])
        }

        fn click(&self, x: i32, y: i32) -> Result<()> {
            send(&[mouse(x, y, MOUSE_EVENT_FLAGS(0))])?;
            std::thread::sleep(Duration::from_millis(50));
            send(&[mouse(x, y, MOUSEEVENTF_LEFTDOWN)])?;
            std::thread::sleep(Duration::from_millis(50));
            send(&[mouse(x, y, MOUSEEVENTF_LEFTUP)])
        }

        fn tap_key(&self, name: &str) -> Result<()> {
            let code =
                virtual_key_code(name).ok_or_else(|| anyhow!("Unsupported key '{}'", name))?;
            send(&[key(code, KEYBD_EVENT_FLAGS(0))])?;
            std::thread::sleep(Duration::from_millis(50));
            send(&[key(code, KEYEVENTF_KEYUP)])
        }
    }
}
