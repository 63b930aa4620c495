use super::Desktop;
use crate::{error::LocalTrackError, model::TargetHandle};
use std::{ffi::c_void, mem};
use windows::{
    core::{BOOL, PWSTR},
    Win32::{
        Foundation::{CloseHandle, HWND, LPARAM},
        System::Threading::{
            OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
            PROCESS_QUERY_LIMITED_INFORMATION,
        },
        UI::{
            Input::KeyboardAndMouse::{
                SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
                KEYEVENTF_KEYUP, VIRTUAL_KEY, VK_A, VK_CONTROL, VK_V,
            },
            WindowsAndMessaging::{
                EnumWindows, GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId,
                IsWindowVisible,
            },
        },
    },
};

#[derive(Clone, Copy, Debug, Default)]
pub struct Win32Desktop;

fn to_hwnd(handle: TargetHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn to_handle(hwnd: HWND) -> TargetHandle {
    TargetHandle(hwnd.0 as isize)
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<HWND>);
    windows.push(hwnd);
    BOOL(1)
}

fn top_level_windows() -> Vec<HWND> {
    let mut windows: Vec<HWND> = Vec::new();
    unsafe {
        let _ = EnumWindows(
            Some(collect_window),
            LPARAM(&mut windows as *mut Vec<HWND> as isize),
        );
    }
    windows
}

fn window_title(hwnd: HWND) -> String {
    let mut buffer = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buffer[..len as usize])
}

fn process_id(hwnd: HWND) -> Option<u32> {
    let mut pid = 0u32;
    unsafe {
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
    }
    (pid != 0).then_some(pid)
}

fn executable_name(pid: u32) -> Option<String> {
    unsafe {
        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buffer = [0u16; 260];
        let mut len = buffer.len() as u32;
        let queried = QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut len,
        );
        let _ = CloseHandle(process);
        queried.ok()?;
        let path = String::from_utf16_lossy(&buffer[..len as usize]);
        path.rsplit('\\').next().map(str::to_owned)
    }
}

fn key_input(vk: VIRTUAL_KEY, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn chord(key: VIRTUAL_KEY) -> [INPUT; 4] {
    let down = KEYBD_EVENT_FLAGS(0);
    [
        key_input(VK_CONTROL, down),
        key_input(key, down),
        key_input(key, KEYEVENTF_KEYUP),
        key_input(VK_CONTROL, KEYEVENTF_KEYUP),
    ]
}

impl Desktop for Win32Desktop {
    fn foreground_window(&self) -> Option<TargetHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        (!hwnd.is_invalid()).then(|| to_handle(hwnd))
    }

    fn enumerable_windows(&self) -> Vec<TargetHandle> {
        top_level_windows().into_iter().map(to_handle).collect()
    }

    fn window_process_id(&self, handle: TargetHandle) -> Option<u32> {
        process_id(to_hwnd(handle))
    }

    fn process_window_titles(&self, process_name: &str) -> Result<Vec<String>, LocalTrackError> {
        let mut titles = Vec::new();
        for hwnd in top_level_windows() {
            if !unsafe { IsWindowVisible(hwnd) }.as_bool() {
                continue;
            }
            let Some(pid) = process_id(hwnd) else {
                continue;
            };
            let matches = executable_name(pid)
                .map(|name| name.eq_ignore_ascii_case(process_name))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            let title = window_title(hwnd);
            if !title.trim().is_empty() {
                titles.push(title);
            }
        }

        if titles.is_empty() {
            Err(LocalTrackError::NoLocalProcess(process_name.to_owned()))
        } else {
            Ok(titles)
        }
    }

    fn send_select_all_paste(&self) -> anyhow::Result<()> {
        let mut inputs = Vec::with_capacity(8);
        inputs.extend(chord(VK_A));
        inputs.extend(chord(VK_V));
        let sent = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            anyhow::bail!(
                "SendInput delivered {sent} of {} key events",
                inputs.len()
            );
        }
        Ok(())
    }
}
