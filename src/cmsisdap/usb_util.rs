use std::io;
use std::time::Duration;

use async_io::{block_on, Timer};
use futures_lite::FutureExt;
use nusb::transfer::RequestBuffer;
use nusb::Interface;

/// Blocking bulk transfers with a timeout on top of nusb's async API.
pub(crate) trait InterfaceExt {
    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> io::Result<usize>;
}

impl InterfaceExt for Interface {
    fn write_bulk(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> io::Result<usize> {
        let fut = async {
            let comp = self.bulk_out(endpoint, buf.to_vec()).await;
            comp.status.map_err(io::Error::other)?;
            Ok(comp.data.actual_length())
        };

        block_on(fut.or(async {
            Timer::after(timeout).await;
            Err(io::ErrorKind::TimedOut.into())
        }))
    }

    fn read_bulk(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut queue = self.bulk_in_queue(endpoint);
        queue.submit(RequestBuffer::new(buf.len()));
        let completion = block_on(async { Some(queue.next_complete().await) }.or(async {
            Timer::after(timeout).await;
            None
        }));

        let Some(comp) = completion else {
            // The cancelled transfer still completes; reap it so the queue
            // is empty when dropped.
            queue.cancel_all();
            let _ = block_on(queue.next_complete());
            return Err(io::ErrorKind::TimedOut.into());
        };

        comp.status.map_err(io::Error::other)?;
        let n = comp.data.len().min(buf.len());
        buf[..n].copy_from_slice(&comp.data[..n]);
        Ok(n)
    }
}
