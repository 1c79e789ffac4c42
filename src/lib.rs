//! Driver for Brother P-touch label printers speaking the raster command
//! protocol over USB (PT-E550W, PT-P750W, PT-P710BT).
//!
//! # Example
//!
//! ```no_run
//! use brother_pt::backend::UsbTransport;
//! use brother_pt::bitmap::Bitmap;
//! use brother_pt::printer::PrintSession;
//!
//! let transport = UsbTransport::open(None)?;
//! let model = transport.model();
//! let mut session = PrintSession::new(transport, model);
//! let status = session.open()?;
//! println!("Media width: {}mm", status.media_width_mm());
//!
//! let label = Bitmap::open("label.png")?;
//! session.print_images(&[label], 0)?;
//! # Ok::<(), brother_pt::Error>(())
//! ```

pub mod backend;
pub mod bitmap;
pub mod error;
pub mod printable_image;
pub mod printer;
pub mod raster_command;
pub mod status;
pub mod tape;

pub use error::{Error, Result};
