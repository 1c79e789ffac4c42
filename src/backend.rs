use crate::error::{Error, Result};
use crate::tape::{Model, USB_VENDOR_BROTHER};
use std::time::Duration;
use tracing::{debug, info};

/// Largest chunk handed to the device in one bulk transfer
pub const MAX_PACKET_SIZE: usize = 0x40;

/// Timeout for a single bulk transfer
pub const USB_TRX_TIMEOUT: Duration = Duration::from_millis(15000);

/// Byte pipe to the printer
pub trait Transport {
    /// Send all of `data`, returning the number of bytes written
    ///
    /// Fails with [`Error::TransportTimeout`] when the device accepts nothing.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read at most `max_len` bytes
    ///
    /// An empty buffer means the device had nothing to say within `timeout`.
    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>>;
}

impl Transport for Box<dyn Transport> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read(max_len, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read(max_len, timeout)
    }
}

/// A supported printer found on the bus
#[derive(Clone, Debug)]
pub struct PrinterInfo {
    pub model: Model,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
}

/// Enumerate attached printers whose product ID is a supported [`Model`]
pub fn list_printers() -> Result<Vec<PrinterInfo>> {
    let mut printers = Vec::new();

    for device in rusb::devices()?.iter() {
        let device_desc = device.device_descriptor()?;
        if device_desc.vendor_id() != USB_VENDOR_BROTHER {
            continue;
        }
        let Some(model) = Model::from_product_id(device_desc.product_id()) else {
            continue;
        };

        let Some(handle) = opened(model, device.open()) else {
            continue;
        };
        printers.push(PrinterInfo {
            model,
            manufacturer: handle
                .read_manufacturer_string_ascii(&device_desc)
                .unwrap_or_default(),
            product: handle
                .read_product_string_ascii(&device_desc)
                .unwrap_or_default(),
            serial_number: handle
                .read_serial_number_string_ascii(&device_desc)
                .unwrap_or_default(),
        });
    }

    Ok(printers)
}

/// A device we may not open (permissions, claimed elsewhere) is skipped
fn opened<H>(model: Model, handle: rusb::Result<H>) -> Option<H> {
    handle
        .inspect_err(|e| debug!(%model, "skipping device that cannot be opened: {}", e))
        .ok()
}

/// Whether a device answers a request for serial number `wanted`
///
/// The serial is only read when one was asked for.
fn serial_matches<F>(model: Model, wanted: Option<&str>, read_serial: F) -> bool
where
    F: FnOnce() -> rusb::Result<String>,
{
    let Some(wanted) = wanted else {
        return true;
    };
    match read_serial() {
        Ok(serial_number) => serial_number == wanted,
        Err(e) => {
            debug!(%model, "skipping device without readable serial: {}", e);
            false
        }
    }
}

pub struct UsbTransport {
    device: rusb::DeviceHandle<rusb::GlobalContext>,
    model: Model,
    interface_number: u8,
    endpoint_in: u8,
    endpoint_out: u8,
    timeout: Duration,
}

impl UsbTransport {
    /// Open the first supported printer, or the one with serial number `serial`
    pub fn open(serial: Option<&str>) -> Result<Self> {
        let mut target = None;

        for device in rusb::devices()?.iter() {
            let device_desc = device.device_descriptor()?;
            if device_desc.vendor_id() != USB_VENDOR_BROTHER {
                continue;
            }
            let Some(model) = Model::from_product_id(device_desc.product_id()) else {
                continue;
            };

            let Some(handle) = opened(model, device.open()) else {
                continue;
            };
            if !serial_matches(model, serial, || {
                handle.read_serial_number_string_ascii(&device_desc)
            }) {
                continue;
            }
            target = Some((device, handle, model));
            break;
        }

        let (device, handle, model) = target.ok_or(Error::NoPrinter)?;

        if let Ok(true) = handle.kernel_driver_active(0) {
            handle.detach_kernel_driver(0)?;
        }

        handle.set_active_configuration(1)?;

        let config_desc = device.config_descriptor(0)?;
        let mut printer_interface = None;

        for interface in config_desc.interfaces() {
            // Printer class
            if let Some(descriptor) = interface.descriptors().find(|d| d.class_code() == 7) {
                printer_interface = Some((interface.number(), descriptor));
                break;
            }
        }

        let (interface_number, interface_desc) =
            printer_interface.ok_or_else(|| Error::Device("no printer interface found".into()))?;
        handle.claim_interface(interface_number)?;

        let mut endpoint_in = 0;
        let mut endpoint_out = 0;

        for endpoint_desc in interface_desc.endpoint_descriptors() {
            if endpoint_desc.transfer_type() != rusb::TransferType::Bulk {
                continue;
            }
            match endpoint_desc.direction() {
                rusb::Direction::In => endpoint_in = endpoint_desc.address(),
                rusb::Direction::Out => endpoint_out = endpoint_desc.address(),
            }
        }

        if endpoint_in == 0 || endpoint_out == 0 {
            return Err(Error::Device(
                "could not find required USB endpoints".into(),
            ));
        }

        info!(%model, interface_number, "USB connection established");
        debug!(
            "endpoint IN 0x{:02x}, endpoint OUT 0x{:02x}",
            endpoint_in, endpoint_out
        );

        Ok(UsbTransport {
            device: handle,
            model,
            interface_number,
            endpoint_in,
            endpoint_out,
            timeout: USB_TRX_TIMEOUT,
        })
    }

    pub fn model(&self) -> Model {
        self.model
    }
}

impl Transport for UsbTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;

        while written < data.len() {
            let end = (written + MAX_PACKET_SIZE).min(data.len());
            let n = match self
                .device
                .write_bulk(self.endpoint_out, &data[written..end], self.timeout)
            {
                Ok(n) => n,
                Err(rusb::Error::Timeout) => 0,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(Error::TransportTimeout);
            }
            written += n;
        }

        debug!("USB write: {} bytes", written);
        Ok(written)
    }

    fn read(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len];

        match self.device.read_bulk(self.endpoint_in, &mut buf, timeout) {
            Ok(n) => {
                buf.truncate(n);
                debug!("USB read: {} bytes", n);
                Ok(buf)
            }
            Err(rusb::Error::Timeout) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.device.release_interface(self.interface_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopenable_device_is_skipped() {
        assert_eq!(opened(Model::P750W, Ok(7)), Some(7));
        assert_eq!(opened::<u8>(Model::P750W, Err(rusb::Error::Access)), None);
    }

    #[test]
    fn test_serial_filter() {
        let read = || Ok("E2G123".to_string());
        assert!(serial_matches(Model::P710BT, Some("E2G123"), read));
        assert!(!serial_matches(Model::P710BT, Some("E2G999"), read));
        assert!(!serial_matches(Model::P710BT, Some("E2G123"), || {
            Err(rusb::Error::Access)
        }));
    }

    #[test]
    fn test_no_serial_filter_skips_reading() {
        assert!(serial_matches(Model::E550W, None, || panic!("serial read")));
    }
}
