//! Window discovery and geometry queries for the target process.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use tracing::{debug, info, warn};

use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    ClientToScreen, GetMonitorInfoW, MonitorFromWindow, MONITORINFO, MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::HiDpi::{
    GetDpiForWindow, SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    IsWindow, IsWindowVisible, SetWindowPos, ShowWindow, SWP_NOSIZE, SWP_NOZORDER, SW_MINIMIZE,
};

use super::roles::{ClientRect, WindowInfo, WindowRole};
use super::WindowHandle;
use crate::config::WindowConfig;
use crate::error::CaptureError;
use crate::geometry::Point;

/// DPI the system treats as 100% scaling.
const BASE_DPI: f32 = 96.0;

/// Makes every Win32 rectangle this process sees use physical pixels.
///
/// Must run before any window geometry is queried. Fails if the awareness
/// was already fixed (for example by a manifest), which is harmless.
pub fn enable_dpi_awareness() {
    match unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) } {
        Ok(()) => debug!("Per-monitor DPI awareness enabled"),
        Err(e) => warn!(error = %e, "Could not change DPI awareness"),
    }
}

/// Lists the visible, titled top-level windows of `process_name`, in Z-order.
pub fn find_windows(process_name: &str) -> Result<Vec<WindowInfo>> {
    let wanted = process_name.to_lowercase();
    let mut found = Vec::new();

    for hwnd in top_level_windows()? {
        let handle = WindowHandle::from_hwnd(hwnd);
        if !unsafe { IsWindowVisible(hwnd).as_bool() } {
            continue;
        }
        let title = window_title(hwnd);
        if title.is_empty() {
            continue;
        }
        let Some(exe) = process_image_name(hwnd) else {
            debug!(window = %handle, title, "Could not resolve owning process");
            continue;
        };
        if exe.to_lowercase() != wanted {
            continue;
        }
        let client = match client_rect(handle) {
            Ok(client) => client,
            Err(e) => {
                debug!(window = %handle, error = %e, "Skipping window without client area");
                continue;
            }
        };
        debug!(window = %handle, title, "Found target window");
        found.push(WindowInfo {
            handle,
            title,
            process_name: exe,
            client,
        });
    }

    info!(process = process_name, count = found.len(), "Window enumeration finished");
    Ok(found)
}

/// Moves or minimizes a window according to its role.
pub fn apply_role(handle: WindowHandle, role: WindowRole, layout: &WindowConfig) -> Result<()> {
    let hwnd = handle.hwnd();
    if !is_window(handle) {
        return Err(anyhow!("window {} no longer exists", handle));
    }
    let target = match role {
        WindowRole::Master => layout.master_origin,
        WindowRole::Slave => layout.slave_origin,
        WindowRole::None => {
            unsafe {
                let _ = ShowWindow(hwnd, SW_MINIMIZE);
            }
            info!(window = %handle, "Minimized window without role");
            return Ok(());
        }
    };
    unsafe {
        SetWindowPos(
            hwnd,
            HWND::default(),
            target.x,
            target.y,
            0,
            0,
            SWP_NOSIZE | SWP_NOZORDER,
        )?;
    }
    info!(window = %handle, %role, position = %target, "Moved window for its role");
    Ok(())
}

pub fn is_window(handle: WindowHandle) -> bool {
    unsafe { IsWindow(handle.hwnd()).as_bool() }
}

/// Client area in physical screen pixels.
pub fn client_rect(handle: WindowHandle) -> Result<ClientRect, CaptureError> {
    let hwnd = handle.hwnd();
    if !is_window(handle) {
        return Err(CaptureError::WindowGone(handle));
    }

    let mut rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut rect) }.map_err(|e| CaptureError::Os(e.to_string()))?;

    let mut origin = POINT { x: 0, y: 0 };
    if !unsafe { ClientToScreen(hwnd, &mut origin).as_bool() } {
        return Err(CaptureError::Os("ClientToScreen failed".to_string()));
    }

    Ok(ClientRect {
        origin: Point::new(origin.x, origin.y),
        width: (rect.right - rect.left).max(0) as u32,
        height: (rect.bottom - rect.top).max(0) as u32,
    })
}

/// Top-left of the monitor holding most of the window, and its DPI scale.
pub fn monitor_of(handle: WindowHandle) -> Result<(Point, f32), CaptureError> {
    let hwnd = handle.hwnd();
    let monitor = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) };
    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if !unsafe { GetMonitorInfoW(monitor, &mut info).as_bool() } {
        return Err(CaptureError::Os("GetMonitorInfoW failed".to_string()));
    }

    let dpi = unsafe { GetDpiForWindow(hwnd) };
    if dpi == 0 {
        // Only fails for an invalid handle
        return Err(CaptureError::WindowGone(handle));
    }

    Ok((
        Point::new(info.rcMonitor.left, info.rcMonitor.top),
        dpi as f32 / BASE_DPI,
    ))
}

fn top_level_windows() -> Result<Vec<HWND>> {
    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let list = &mut *(lparam.0 as *mut Vec<HWND>);
            list.push(hwnd);
        }
        TRUE
    }

    let mut list: Vec<HWND> = Vec::new();
    unsafe {
        EnumWindows(Some(collect), LPARAM(&mut list as *mut _ as isize))?;
    }
    Ok(list)
}

fn window_title(hwnd: HWND) -> String {
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return String::new();
        }
        let mut buf: Vec<u16> = vec![0; (len + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut buf).max(0) as usize;
        OsString::from_wide(&buf[..copied])
            .to_string_lossy()
            .to_string()
    }
}

/// Executable file name of the process owning `hwnd`.
fn process_image_name(hwnd: HWND) -> Option<String> {
    unsafe {
        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        if process_id == 0 {
            return None;
        }

        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;
        let mut name_buf: Vec<u16> = vec![0; 1024];
        let mut len = name_buf.len() as u32;
        let result = QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(name_buf.as_mut_ptr()),
            &mut len,
        );
        let _ = CloseHandle(process);
        if result.is_err() || len == 0 {
            return None;
        }

        let full_path = OsString::from_wide(&name_buf[..len as usize])
            .to_string_lossy()
            .to_string();
        full_path.rsplit('\\').next().map(str::to_string)
    }
}
