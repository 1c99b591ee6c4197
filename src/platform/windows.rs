// ============================================================================
// WINDOWS — low-level keyboard/mouse hooks and SendInput injection
// ============================================================================
//
// Both hooks live on one dedicated thread that pumps messages until it gets
// WM_QUIT. The hook procedures run on that thread and hand events to the
// single subscribed handler through a static slot, since the Win32 callbacks
// carry no user pointer. Injected events are skipped so ghost clicks and
// remapped keys never loop back in.

use std::ptr;
use std::sync::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};
use winapi::shared::minwindef::{DWORD, LPARAM, LRESULT, WPARAM};
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::processthreadsapi::GetCurrentThreadId;
use winapi::um::winuser::{
    CallNextHookEx, DispatchMessageW, GetMessageW, GetSystemMetrics, PostThreadMessageW,
    SendInput, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HC_ACTION, INPUT,
    INPUT_KEYBOARD, INPUT_MOUSE, KBDLLHOOKSTRUCT, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, LLKHF_INJECTED, LLMHF_INJECTED, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT, MSG, MSLLHOOKSTRUCT, SM_CXSCREEN,
    SM_CYSCREEN, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MBUTTONDOWN, WM_MBUTTONUP, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN,
};

use crate::error::{OverlayError, Result};
use crate::hooks::{HookEvent, HookHandler, HookSource, InputInjector, ModifierTracker};
use crate::input::{Key, KeyEvent, PointerButton};

static HANDLER: Mutex<Option<HookHandler>> = Mutex::new(None);
static MODIFIERS: Mutex<ModifierTracker> = Mutex::new(ModifierTracker::new());

fn dispatch(event: HookEvent) {
    if let Ok(slot) = HANDLER.lock()
        && let Some(handler) = slot.as_ref()
    {
        handler(event);
    }
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION {
        // SAFETY: for WH_KEYBOARD_LL with HC_ACTION, lparam points at a KBDLLHOOKSTRUCT
        let info = unsafe { &*(lparam as *const KBDLLHOOKSTRUCT) };
        if info.flags & LLKHF_INJECTED == 0 {
            let pressed = matches!(wparam as u32, WM_KEYDOWN | WM_SYSKEYDOWN);
            let key = Key::from_vk(info.vkCode);
            let modifiers = MODIFIERS
                .lock()
                .map(|mut t| t.observe(key, pressed))
                .unwrap_or_default();
            dispatch(HookEvent::Key(KeyEvent { key, pressed, modifiers }));
        }
    }
    unsafe { CallNextHookEx(ptr::null_mut(), code, wparam, lparam) }
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION {
        // SAFETY: for WH_MOUSE_LL with HC_ACTION, lparam points at an MSLLHOOKSTRUCT
        let info = unsafe { &*(lparam as *const MSLLHOOKSTRUCT) };
        let button = match wparam as u32 {
            WM_LBUTTONDOWN => Some((PointerButton::Primary, true)),
            WM_LBUTTONUP => Some((PointerButton::Primary, false)),
            WM_RBUTTONDOWN => Some((PointerButton::Secondary, true)),
            WM_RBUTTONUP => Some((PointerButton::Secondary, false)),
            WM_MBUTTONDOWN => Some((PointerButton::Middle, true)),
            WM_MBUTTONUP => Some((PointerButton::Middle, false)),
            _ => None,
        };
        if let Some((button, pressed)) = button
            && info.flags & LLMHF_INJECTED == 0
        {
            dispatch(HookEvent::MouseButton {
                pos: (info.pt.x, info.pt.y),
                button,
                pressed,
            });
        }
    }
    unsafe { CallNextHookEx(ptr::null_mut(), code, wparam, lparam) }
}

fn hook_thread(ready: Sender<Result<DWORD>>) {
    unsafe {
        let module = GetModuleHandleW(ptr::null());
        let keyboard = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), module, 0);
        if keyboard.is_null() {
            let err = std::io::Error::last_os_error();
            let _ = ready.send(Err(OverlayError::Hook(format!("keyboard hook failed: {err}"))));
            return;
        }
        let mouse = SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), module, 0);
        if mouse.is_null() {
            let err = std::io::Error::last_os_error();
            UnhookWindowsHookEx(keyboard);
            let _ = ready.send(Err(OverlayError::Hook(format!("mouse hook failed: {err}"))));
            return;
        }
        let _ = ready.send(Ok(GetCurrentThreadId()));

        let mut msg: MSG = std::mem::zeroed();
        while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        UnhookWindowsHookEx(mouse);
        UnhookWindowsHookEx(keyboard);
    }
    debug!("hook thread finished");
}

/// Desktop-wide keyboard and mouse-button hooks.
#[derive(Default)]
pub struct LowLevelHookSource {
    worker: Option<(DWORD, JoinHandle<()>)>,
}

impl HookSource for LowLevelHookSource {
    fn subscribe(&mut self, handler: HookHandler) -> Result<()> {
        self.unsubscribe();
        if let Ok(mut slot) = HANDLER.lock() {
            *slot = Some(handler);
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("orthy-hooks".into())
            .spawn(move || hook_thread(ready_tx))
            .map_err(|e| OverlayError::Hook(format!("could not start hook thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.worker = Some((thread_id, handle));
                info!("global input hooks installed");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                if let Ok(mut slot) = HANDLER.lock() {
                    *slot = None;
                }
                error!(error = %e, "global input hooks unavailable");
                Err(e)
            }
            Err(_) => Err(OverlayError::Hook("hook thread exited during setup".into())),
        }
    }

    fn unsubscribe(&mut self) {
        if let Some((thread_id, handle)) = self.worker.take() {
            unsafe {
                PostThreadMessageW(thread_id, WM_QUIT, 0, 0);
            }
            let _ = handle.join();
            info!("global input hooks removed");
        }
        if let Ok(mut slot) = HANDLER.lock() {
            *slot = None;
        }
    }

    fn is_subscribed(&self) -> bool {
        self.worker.is_some()
    }

    fn is_global(&self) -> bool {
        true
    }
}

impl Drop for LowLevelHookSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ---------------------------------------------------------------------------
//  Injection
// ---------------------------------------------------------------------------

pub struct SendInputInjector;

fn mouse_input(dx: i32, dy: i32, flags: DWORD) -> INPUT {
    // SAFETY: INPUT is plain data; all-zero is a valid value
    let mut input: INPUT = unsafe { std::mem::zeroed() };
    input.type_ = INPUT_MOUSE;
    unsafe {
        *input.u.mi_mut() = MOUSEINPUT {
            dx,
            dy,
            mouseData: 0,
            dwFlags: flags,
            time: 0,
            dwExtraInfo: 0,
        };
    }
    input
}

fn key_input(vk: u16, flags: DWORD) -> INPUT {
    // SAFETY: as above
    let mut input: INPUT = unsafe { std::mem::zeroed() };
    input.type_ = INPUT_KEYBOARD;
    unsafe {
        *input.u.ki_mut() = KEYBDINPUT {
            wVk: vk,
            wScan: 0,
            dwFlags: flags,
            time: 0,
            dwExtraInfo: 0,
        };
    }
    input
}

fn send(inputs: &mut [INPUT]) -> Result<()> {
    let sent = unsafe {
        SendInput(
            inputs.len() as u32,
            inputs.as_mut_ptr(),
            std::mem::size_of::<INPUT>() as i32,
        )
    };
    if sent as usize == inputs.len() {
        Ok(())
    } else {
        Err(OverlayError::Hook(format!(
            "SendInput accepted {sent} of {} events",
            inputs.len()
        )))
    }
}

impl InputInjector for SendInputInjector {
    fn click_at(&self, pos: (i32, i32)) -> Result<()> {
        let (sw, sh) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if sw <= 0 || sh <= 0 {
            return Err(OverlayError::Hook("screen size unavailable".into()));
        }
        // Absolute coordinates are normalized to 0..65535
        let ax = (pos.0 as i64 * 65536 / sw as i64) as i32;
        let ay = (pos.1 as i64 * 65536 / sh as i64) as i32;
        let mut inputs = [
            mouse_input(ax, ay, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE),
            mouse_input(0, 0, MOUSEEVENTF_LEFTDOWN),
            mouse_input(0, 0, MOUSEEVENTF_LEFTUP),
        ];
        send(&mut inputs)?;
        debug!(x = pos.0, y = pos.1, "ghost click");
        Ok(())
    }

    fn tap_key(&self, key: Key) -> Result<()> {
        let vk = key.to_vk() as u16;
        let extended = if matches!(key, Key::Up | Key::Down | Key::Left | Key::Right) {
            KEYEVENTF_EXTENDEDKEY
        } else {
            0
        };
        let mut inputs = [key_input(vk, extended), key_input(vk, extended | KEYEVENTF_KEYUP)];
        send(&mut inputs)?;
        debug!(key = %key.name(), "key tap injected");
        Ok(())
    }
}
