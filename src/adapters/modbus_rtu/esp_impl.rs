//! ESP-IDF UART backing for [`SerialLink`].
//!
//! Compiled only for `target_os = "espidf"`. The UART is configured 8N1 at
//! the catalog's baud rate; DE is handled by the master, not by the UART's
//! RS-485 half-duplex mode, so a plain GPIO works for any transceiver.

use esp_idf_hal::delay::TickType;
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{Uart, UartDriver, config};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use super::SerialLink;
use crate::error::TransportError;

/// Longest a request may sit in the TX FIFO (8 bytes at 1200 baud ≈ 70 ms).
const TX_DRAIN_MS: u64 = 100;

/// Open the Modbus UART, 8N1, no hardware flow control.
pub fn open_uart<'d, U: Uart>(
    uart: impl Peripheral<P = U> + 'd,
    tx: impl Peripheral<P = impl OutputPin> + 'd,
    rx: impl Peripheral<P = impl InputPin> + 'd,
    baud_rate: u32,
) -> anyhow::Result<UartDriver<'d>> {
    let conf = config::Config::new().baudrate(Hertz(baud_rate));
    let driver = UartDriver::new(
        uart,
        tx,
        rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &conf,
    )?;
    info!("RTU: UART open at {} baud", baud_rate);
    Ok(driver)
}

impl SerialLink for UartDriver<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut sent = 0;
        while sent < bytes.len() {
            let n = UartDriver::write(self, &bytes[sent..]).map_err(|e| {
                warn!("RTU: UART write failed ({})", e);
                TransportError::Timeout
            })?;
            sent += n;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.wait_tx_done(TickType::new_millis(TX_DRAIN_MS).ticks())
            .map_err(|e| {
                warn!("RTU: TX drain timed out ({})", e);
                TransportError::Timeout
            })
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        let ticks = TickType::new_millis(u64::from(timeout_ms)).ticks();
        // A read timeout is an empty read, not an error.
        Ok(UartDriver::read(self, buf, ticks).unwrap_or(0))
    }

    fn clear_input(&mut self) {
        if let Err(e) = self.clear_rx() {
            warn!("RTU: clear_rx failed ({})", e);
        }
    }
}
