use crate::backend::Transport;
use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use crate::printable_image::{prepare_image, rasterize};
use crate::raster_command::{self as command, AdvancedMode};
use crate::status::{MediaType, Status, StatusType, TapeColor, TextColor};
use crate::tape::{MINIMUM_TAPE_POINTS, Model, STATUS_MESSAGE_LENGTH, TapeSpec};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Blank raster lines sent before the print command
const FLUSH_LINES: usize = 6;

/// Where a [`PrintSession`] stands in the printer's command sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    StatusKnown,
    DynamicMode,
    Printing { page: usize, pages: usize },
    Completed,
    Errored,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// How long a single read waits for the printer
    pub read_timeout: Duration,
    /// Consecutive empty reads tolerated while waiting for a reply
    pub max_empty_reads: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            read_timeout: Duration::from_millis(15000),
            max_empty_reads: 10,
        }
    }
}

/// One print job at a time over an exclusively owned transport
///
/// Tape geometry is resolved through the printer's [`Model`].
///
/// The status read at [`open`](Self::open) is cached and only refreshed by
/// `open` and [`print_images`](Self::print_images). After an error the
/// session should be dropped and a new one opened.
pub struct PrintSession<T: Transport> {
    transport: T,
    model: Model,
    options: SessionOptions,
    status: Option<Status>,
    state: SessionState,
}

impl<T: Transport> PrintSession<T> {
    pub fn new(transport: T, model: Model) -> Self {
        Self::with_options(transport, model, SessionOptions::default())
    }

    pub fn with_options(transport: T, model: Model, options: SessionOptions) -> Self {
        PrintSession {
            transport,
            model,
            options,
            status: None,
            state: SessionState::Idle,
        }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn media_width(&self) -> Option<u8> {
        self.status.as_ref().map(Status::media_width_mm)
    }

    pub fn media_type(&self) -> Option<MediaType> {
        self.status.as_ref().map(Status::media_type)
    }

    pub fn tape_color(&self) -> Option<TapeColor> {
        self.status.as_ref().map(Status::tape_color)
    }

    pub fn text_color(&self) -> Option<TextColor> {
        self.status.as_ref().map(Status::text_color)
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Reset the printer and read its status
    pub fn open(&mut self) -> Result<&Status> {
        self.write(&command::invalidate())?;
        self.write(&command::initialize())?;

        let mut empty_reads = 0;
        let reply = loop {
            self.write(&command::status_information_request())?;
            let reply = self
                .transport
                .read(STATUS_MESSAGE_LENGTH, self.options.read_timeout)?;
            if !reply.is_empty() {
                break reply;
            }
            empty_reads += 1;
            debug!(empty_reads, "no status reply yet");
            if empty_reads >= self.options.max_empty_reads {
                return Err(Error::TransportTimeout);
            }
        };

        let status = Status::decode(&reply)?;
        info!(
            media_width = status.media_width_mm(),
            media_type = %status.media_type(),
            tape_color = %status.tape_color(),
            text_color = %status.text_color(),
            "printer status"
        );
        self.state = SessionState::StatusKnown;
        Ok(self.status.insert(status))
    }

    /// Print `pages` as one continuous job
    ///
    /// Only the last page is fed and cut. A failure on any page aborts the
    /// rest of the job.
    #[instrument(skip(self, pages), fields(pages = pages.len()))]
    pub fn print_images(&mut self, pages: &[Bitmap], margin_px: u16) -> Result<()> {
        self.open()?;
        let media_width = self.media_width().ok_or(Error::StatusUnknown)?;
        let tape_spec = self.model.tape_spec(media_width)?;

        if pages.is_empty() {
            warn!("nothing to print");
            return Ok(());
        }

        for (index, page) in pages.iter().enumerate() {
            let result = self.print_page(page, &tape_spec, margin_px, index + 1, pages.len());
            self.fail_on_error(result)?;
        }

        Ok(())
    }

    fn print_page(
        &mut self,
        bitmap: &Bitmap,
        tape_spec: &TapeSpec,
        margin_px: u16,
        page: usize,
        pages: usize,
    ) -> Result<()> {
        let image = prepare_image(bitmap, tape_spec)?;

        let mut margin = margin_px;
        if image.width() + u32::from(margin_px) < MINIMUM_TAPE_POINTS {
            warn!(
                "Image ({}) + cut margin ({}) is smaller than minimum tape length ({}), \
                 cutting length will be extended",
                image.width(),
                margin_px,
                MINIMUM_TAPE_POINTS
            );
            margin = (MINIMUM_TAPE_POINTS - image.width()) as u16;
        }

        let raster = rasterize(&image, tape_spec)?;
        self.send_page(&raster, margin, page == pages, page, pages)
    }

    /// Send one page of raster data and wait until it is printed
    pub fn print_data(&mut self, raster: &[u8], margin_px: u16, is_last_page: bool) -> Result<()> {
        let result = self.send_page(raster, margin_px, is_last_page, 1, 1);
        self.fail_on_error(result)
    }

    fn send_page(
        &mut self,
        raster: &[u8],
        margin_px: u16,
        is_last_page: bool,
        page: usize,
        pages: usize,
    ) -> Result<()> {
        let media_width = self.media_width().ok_or(Error::StatusUnknown)?;

        self.write(&command::enter_dynamic_command_mode())?;
        self.state = SessionState::DynamicMode;
        self.write(&command::enable_status_notification())?;
        self.write(&command::print_information(raster.len(), media_width))?;
        self.write(&command::set_mode(true, false))?;
        self.write(&command::set_advanced_mode(AdvancedMode::no_chain()))?;
        self.write(&command::margin_amount(margin_px))?;
        self.write(&command::set_compression_mode())?;

        self.state = SessionState::Printing { page, pages };
        for frame in command::gen_raster_commands(raster) {
            self.write(&frame)?;
        }
        for _ in 0..FLUSH_LINES {
            self.write(&command::zero_raster_line())?;
        }

        if is_last_page {
            self.write(&command::print_with_feeding())?;
        } else {
            self.write(&command::print_without_feeding())?;
        }
        debug!(page, pages, bytes = raster.len(), "page sent");

        self.wait_for_completion()?;
        self.state = SessionState::Completed;
        info!(page, pages, "printing completed");
        Ok(())
    }

    fn fail_on_error<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_err() && self.state != SessionState::Idle {
            self.state = SessionState::Errored;
        }
        result
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        let mut empty_reads = 0;

        loop {
            let reply = self
                .transport
                .read(STATUS_MESSAGE_LENGTH, self.options.read_timeout)?;
            if reply.is_empty() {
                empty_reads += 1;
                if empty_reads >= self.options.max_empty_reads {
                    return Err(Error::TransportTimeout);
                }
                continue;
            }
            empty_reads = 0;

            let status = Status::decode(&reply)?;
            match status.status_type() {
                StatusType::PrintingCompleted => {
                    // Drain the phase change notification that follows
                    self.transport
                        .read(STATUS_MESSAGE_LENGTH, self.options.read_timeout)?;
                    return Ok(());
                }
                StatusType::ErrorOccurred => {
                    return Err(Error::Printer(status.error_conditions()));
                }
                other => debug!(status_type = %other, "ignoring status reply"),
            }
        }
    }

    fn write(&mut self, frame: &[u8]) -> Result<usize> {
        let written = self.transport.write(frame)?;
        if written == 0 {
            return Err(Error::TransportTimeout);
        }
        Ok(written)
    }
}
