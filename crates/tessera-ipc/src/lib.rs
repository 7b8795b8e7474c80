//! Tessera shell protocol
//!
//! Message types exchanged between the compositor and `tessera-shell`
//! (the desktop shell coordinator), plus the length-prefixed framing used
//! on the Unix socket that connects them.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Interface name of the shell global
pub const DESKTOP_SHELL_INTERFACE: &str = "desktop_shell";

/// Interface name of an output global
pub const OUTPUT_INTERFACE: &str = "wl_output";

/// Highest shell interface version this client understands
pub const DESKTOP_SHELL_VERSION: u32 = 2;

/// Version outputs are bound at
pub const OUTPUT_VERSION: u32 = 2;

/// Frames larger than this are treated as a protocol error
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Socket path for the compositor connection
pub fn socket_path() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("TESSERA_SHELL_SOCKET") {
        return std::path::PathBuf::from(path);
    }
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    std::path::PathBuf::from(runtime_dir).join("tessera-shell.sock")
}

/// Grab cursor values as sent by the compositor in `GrabCursor`
pub mod grab_cursor {
    pub const NONE: u32 = 0;
    pub const RESIZE_TOP: u32 = 1;
    pub const RESIZE_BOTTOM: u32 = 2;
    pub const ARROW: u32 = 3;
    pub const RESIZE_LEFT: u32 = 4;
    pub const RESIZE_TOP_LEFT: u32 = 5;
    pub const RESIZE_BOTTOM_LEFT: u32 = 6;
    pub const MOVE: u32 = 7;
    pub const RESIZE_RIGHT: u32 = 8;
    pub const RESIZE_TOP_RIGHT: u32 = 9;
    pub const RESIZE_BOTTOM_RIGHT: u32 = 10;
    pub const BUSY: u32 = 11;
}

/// Linux input code of the left mouse button
pub const BTN_LEFT: u32 = 0x110;

/// An axis-aligned rectangle in surface-local coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the point lies inside the rectangle
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x as f32
            && x < (self.x + self.width) as f32
            && y >= self.y as f32
            && y < (self.y + self.height) as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Cursor shapes the shell can ask the compositor to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorShape {
    Blank,
    Watch,
    Dragging,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    #[default]
    LeftPtr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Pointer input delivered to one shell surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PointerEvent {
    Enter { x: f32, y: f32 },
    Leave,
    Motion { x: f32, y: f32 },
    Button { button: u32, state: ButtonState },
}

/// Touch input delivered to one shell surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TouchEvent {
    Down { id: i32, x: f32, y: f32 },
    Up { id: i32 },
}

// ============================================================================
// Compositor → Shell Events
// ============================================================================

/// Events sent from the compositor to the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShellEvent {
    /// A global object was advertised
    Global {
        name: u32,
        interface: String,
        version: u32,
    },

    /// A previously advertised global went away
    GlobalRemove { name: u32 },

    /// Output geometry, including its buffer transform
    OutputGeometry {
        output: u32,
        x: i32,
        y: i32,
        physical_width: i32,
        physical_height: i32,
        subpixel: i32,
        make: String,
        model: String,
        transform: i32,
    },

    /// Output integer scale factor
    OutputScale { output: u32, scale: i32 },

    /// Role-specific layout request for a shell surface
    Configure {
        edges: u32,
        surface: u32,
        width: i32,
        height: i32,
    },

    /// The compositor is about to lock and wants a lock surface
    PrepareLockSurface,

    /// Cursor to show while the compositor holds a grab
    GrabCursor { cursor: u32 },

    /// A new application window is available for taskbar control
    ManagedSurfaceAdded { handle: u32 },

    /// Authoritative minimize/raise state of a managed window
    ManagedSurfaceStateChanged { handle: u32, state: u32 },

    /// A managed window's title changed
    ManagedSurfaceTitleChanged { handle: u32, title: String },

    /// A managed window went away
    ManagedSurfaceRemoved { handle: u32 },

    /// Pointer input on a shell surface
    Pointer { surface: u32, event: PointerEvent },

    /// Touch input on a shell surface
    Touch { surface: u32, event: TouchEvent },
}

// ============================================================================
// Shell → Compositor Requests
// ============================================================================

/// Requests sent from the shell to the compositor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShellRequest {
    /// Bind an advertised global at the given version
    Bind {
        name: u32,
        interface: String,
        version: u32,
    },

    /// Create a role-less surface with a shell-chosen id
    CreateSurface { surface: u32, title: String },

    /// Destroy a surface
    DestroySurface { surface: u32 },

    /// A new buffer of the given size is ready for the surface
    Commit { surface: u32, width: i32, height: i32 },

    SetBufferTransform { surface: u32, transform: i32 },

    SetBufferScale { surface: u32, scale: i32 },

    /// Declare part of a surface fully opaque
    SetOpaqueRegion { surface: u32, region: Rectangle },

    /// Cursor to show while the pointer is over the surface
    SetCursor { surface: u32, cursor: CursorShape },

    /// Show a tooltip anchored at surface-local `x`,`y`
    SetTooltip {
        surface: u32,
        x: i32,
        y: i32,
        text: String,
    },

    /// Hide the surface's tooltip
    ClearTooltip { surface: u32 },

    SetPanel { output: u32, surface: u32 },

    SetTaskbar { output: u32, surface: u32 },

    SetBackground { output: u32, surface: u32 },

    SetGrabSurface { surface: u32 },

    SetLockSurface { surface: u32 },

    /// The desktop may be unlocked
    Unlock,

    /// Every shell surface has been painted (shell version 2 and later)
    DesktopReady,

    /// Ask the compositor to minimize (non-zero) or raise (zero) a window
    SetManagedSurfaceState { handle: u32, state: u32 },

    /// Release the shell's reference to a managed window
    DestroyManagedSurface { handle: u32 },

    /// Release a bound output
    ReleaseOutput { output: u32 },
}

// ============================================================================
// Message Framing
// ============================================================================

/// A framed message with length prefix for reliable socket reads
#[derive(Debug)]
pub struct FramedMessage {
    pub data: Vec<u8>,
}

impl FramedMessage {
    /// Create a new framed message from serializable data
    pub fn new<T: Serialize>(msg: &T) -> anyhow::Result<Self> {
        let data = serde_json::to_vec(msg)?;
        Ok(Self { data })
    }

    /// Encode message with length prefix (4 bytes, big-endian)
    pub fn encode(&self) -> Vec<u8> {
        let len = self.data.len() as u32;
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Decode a shell event from bytes
    pub fn decode_event(data: &[u8]) -> anyhow::Result<ShellEvent> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Decode a shell request from bytes
    pub fn decode_request(data: &[u8]) -> anyhow::Result<ShellRequest> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Read one frame body. Returns `None` on a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("message too large: {} bytes", len);
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Serialize and write one frame
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = FramedMessage::new(msg)?;
    writer.write_all(&frame.encode()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixStream;

    #[test]
    fn test_event_wire_format_is_tagged() {
        let event = ShellEvent::Configure {
            edges: 0,
            surface: 7,
            width: 1024,
            height: 600,
        };

        let msg = FramedMessage::new(&event).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&msg.data).unwrap();
        assert_eq!(json["type"], "Configure");
        assert_eq!(json["surface"], 7);

        let encoded = msg.encode();
        assert_eq!(&encoded[..4], &(msg.data.len() as u32).to_be_bytes());
    }

    #[test]
    fn test_decode_pointer_event_from_compositor() {
        let raw = br#"{"type":"Pointer","surface":3,"event":{"kind":"Button","button":272,"state":"Released"}}"#;
        let decoded = FramedMessage::decode_event(raw).unwrap();

        assert_eq!(
            decoded,
            ShellEvent::Pointer {
                surface: 3,
                event: PointerEvent::Button {
                    button: BTN_LEFT,
                    state: ButtonState::Released,
                },
            }
        );
    }

    #[test]
    fn test_rectangle_contains_is_half_open() {
        let rect = Rectangle::new(10, 8, 21, 21);
        assert!(rect.contains(10.0, 8.0));
        assert!(rect.contains(30.5, 28.5));
        assert!(!rect.contains(31.0, 10.0));
        assert!(!rect.contains(9.9, 10.0));
        assert!(Rectangle::new(0, 0, 0, 5).is_empty());
    }

    #[tokio::test]
    async fn test_frames_over_socket() {
        let (mut a, mut b) = UnixStream::pair().unwrap();

        write_frame(&mut a, &ShellRequest::SetCursor { surface: 1, cursor: CursorShape::Watch })
            .await
            .unwrap();
        write_frame(&mut a, &ShellRequest::DesktopReady).await.unwrap();
        drop(a);

        let first = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(
            FramedMessage::decode_request(&first).unwrap(),
            ShellRequest::SetCursor { surface: 1, cursor: CursorShape::Watch }
        );
        let second = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(FramedMessage::decode_request(&second).unwrap(), ShellRequest::DesktopReady);
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        a.write_all(&len).await.unwrap();

        assert!(read_frame(&mut b).await.is_err());
    }
}
