//! Frame capture using the Windows Graphics Capture API.
//!
//! Captures the window's own surface, so the target does not need to be
//! visible or topmost, then crops it to the client area.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{Direct3D11CaptureFramePool, GraphicsCaptureItem};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::System::WinRT::{RoGetActivationFactory, RoInitialize, RO_INIT_MULTITHREADED};

use super::region::{CaptureRegion, Frame};
use super::window::{client_rect, is_window, monitor_of};
use super::{Capture, FrameSource, WindowHandle};
use crate::error::CaptureError;
use crate::geometry::Point;

impl From<windows::core::Error> for CaptureError {
    fn from(e: windows::core::Error) -> Self {
        CaptureError::Os(e.to_string())
    }
}

/// Captures one window's client area per call.
///
/// Holds a D3D11 device for its lifetime; everything else is created and
/// dropped within each capture. Not `Send`: build it on the thread that uses it.
pub struct WindowCapturer {
    handle: WindowHandle,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    d3d_device: IDirect3DDevice,
    timeout: Duration,
}

impl WindowCapturer {
    pub fn new(handle: WindowHandle, timeout_ms: u64) -> Result<Self, CaptureError> {
        if !is_window(handle) {
            return Err(CaptureError::WindowGone(handle));
        }
        // Already initialized on this thread is fine
        let _ = unsafe { RoInitialize(RO_INIT_MULTITHREADED) };

        let (device, context) = create_d3d11_device()?;
        let d3d_device = create_direct3d_device(&device)?;
        debug!(window = %handle, "Capture device ready");

        Ok(Self {
            handle,
            device,
            context,
            d3d_device,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Grabs the whole window surface as BGRA rows, plus its size.
    fn grab_window(&self) -> Result<(Vec<u8>, u32, u32), CaptureError> {
        let item = create_capture_item(self.handle)?;
        let size = item.Size()?;

        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &self.d3d_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            size,
        )?;
        let session = frame_pool.CreateCaptureSession(&item)?;

        let frame_arrived = Arc::new(AtomicBool::new(false));
        let frame_arrived_clone = frame_arrived.clone();
        frame_pool.FrameArrived(&TypedEventHandler::new(
            move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
                frame_arrived_clone.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))?;

        session.StartCapture()?;

        let start = Instant::now();
        while !frame_arrived.load(Ordering::SeqCst) {
            if start.elapsed() > self.timeout {
                let _ = session.Close();
                let _ = frame_pool.Close();
                if !is_window(self.handle) {
                    return Err(CaptureError::WindowGone(self.handle));
                }
                return Err(CaptureError::Timeout(self.timeout.as_millis() as u64));
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let frame = frame_pool.TryGetNextFrame()?;
        let surface = frame.Surface()?;
        let access: IDirect3DDxgiInterfaceAccess = surface.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

        let result = self.read_texture(&texture);

        session.Close()?;
        frame_pool.Close()?;
        result
    }

    /// Copies a GPU texture into tightly packed BGRA bytes.
    fn read_texture(&self, texture: &ID3D11Texture2D) -> Result<(Vec<u8>, u32, u32), CaptureError> {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: desc.SampleDesc,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };

        let staging = unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
            staging.ok_or_else(|| CaptureError::Os("Failed to create staging texture".into()))?
        };
        let staging_resource = staging.cast::<ID3D11Resource>()?;

        unsafe {
            self.context
                .CopyResource(&staging_resource, &texture.cast::<ID3D11Resource>()?);
        }

        let mapped = unsafe {
            let mut mapped = Default::default();
            self.context
                .Map(&staging_resource, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;
            mapped
        };

        let row_pitch = mapped.RowPitch as usize;
        let width = desc.Width as usize;
        let height = desc.Height as usize;
        let src = unsafe {
            std::slice::from_raw_parts(mapped.pData as *const u8, row_pitch * height)
        };
        let mut bgra = Vec::with_capacity(width * height * 4);
        for row in src.chunks_exact(row_pitch).take(height) {
            bgra.extend_from_slice(&row[..width * 4]);
        }

        unsafe { self.context.Unmap(&staging_resource, 0) };
        Ok((bgra, desc.Width, desc.Height))
    }
}

impl FrameSource for WindowCapturer {
    fn capture(&mut self) -> Result<Capture, CaptureError> {
        let client = client_rect(self.handle)?;
        let (monitor_offset, dpi_scale) = monitor_of(self.handle)?;
        let region = CaptureRegion::new(
            client.origin,
            client.width,
            client.height,
            monitor_offset,
            dpi_scale,
        )
        .ok_or(CaptureError::EmptyRegion(self.handle))?;

        let (bgra, surface_width, surface_height) = self.grab_window()?;

        // The surface includes the visible frame; the client area sits at
        // its offset from the surface's top-left.
        let surface_origin = surface_origin(self.handle)?;
        let crop = Point::new(
            client.origin.x - surface_origin.x,
            client.origin.y - surface_origin.y,
        );
        let frame = Frame::crop_bgra(
            &bgra,
            surface_width,
            surface_height,
            crop,
            region.width,
            region.height,
        );
        trace!(
            window = %self.handle,
            width = region.width,
            height = region.height,
            dpi_scale = region.dpi_scale,
            "Captured frame"
        );

        Ok(Capture { region, frame })
    }
}

/// Top-left of the area the capture surface covers.
///
/// Graphics Capture returns the DWM extended frame bounds, which exclude the
/// invisible resize borders that `GetWindowRect` reports.
fn surface_origin(handle: WindowHandle) -> Result<Point, CaptureError> {
    use windows::Win32::Foundation::RECT;
    use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_EXTENDED_FRAME_BOUNDS};
    use windows::Win32::UI::WindowsAndMessaging::GetWindowRect;

    let mut rect = RECT::default();
    let bounds = unsafe {
        DwmGetWindowAttribute(
            handle.hwnd(),
            DWMWA_EXTENDED_FRAME_BOUNDS,
            &mut rect as *mut RECT as *mut std::ffi::c_void,
            std::mem::size_of::<RECT>() as u32,
        )
    };
    if let Err(e) = bounds {
        // Composition off: the surface is the full window rect
        debug!(window = %handle, error = %e, "No extended frame bounds");
        unsafe { GetWindowRect(handle.hwnd(), &mut rect) }
            .map_err(|_| CaptureError::WindowGone(handle))?;
    }
    Ok(Point::new(rect.left, rect.top))
}

fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext), CaptureError> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }

    Ok((
        device.ok_or_else(|| CaptureError::Os("Failed to create D3D11 device".into()))?,
        context.ok_or_else(|| CaptureError::Os("Failed to create D3D11 context".into()))?,
    ))
}

/// WinRT wrapper around the D3D11 device, required by the capture API.
fn create_direct3d_device(device: &ID3D11Device) -> Result<IDirect3DDevice, CaptureError> {
    let dxgi_device: IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
    Ok(inspectable.cast()?)
}

fn create_capture_item(handle: WindowHandle) -> Result<GraphicsCaptureItem, CaptureError> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop = unsafe { RoGetActivationFactory(class_name)? };
    unsafe { interop.CreateForWindow(handle.hwnd()) }.map_err(|e| {
        if is_window(handle) {
            CaptureError::Os(format!("Failed to create capture item: {}", e))
        } else {
            CaptureError::WindowGone(handle)
        }
    })
}
