//! Generic stream copy and the move/copy fast-path rule.
//!
//! Backends that share a scheme and an authority move files with their
//! native rename; everything else funnels through [`stream_to`], a
//! buffered byte copy over the [`File`] trait.

use crate::errors::Result;
use crate::interfaces::File;
use std::sync::Arc;
use tracing::debug;

/// True when `src` and `dst` live on the same kind of backend under the
/// same authority, so a backend-native rename or copy applies.
pub fn same_target(src: &dyn File, dst: &dyn File) -> bool {
    src.scheme() == dst.scheme() && src.authority() == dst.authority()
}

/// True when both handles were created from the very same file system
/// instance. Backends whose authority does not identify the namespace
/// (single-namespace cloud drives) gate their native fast path on this
/// instead of [`same_target`].
pub fn same_filesystem(src: &dyn File, dst: &dyn File) -> bool {
    let (a, b) = (src.filesystem(), dst.filesystem());
    std::ptr::addr_eq(Arc::as_ptr(&a), Arc::as_ptr(&b))
}

/// Streams `src` into `dst` through a `buffer_size` byte buffer.
///
/// Refused with the copy-refused sentinel when the source cursor is not
/// at zero. An empty source touches the target into existence, since no
/// write would otherwise materialize it. Both handles are closed on every
/// path; when the close of the written side and the close of the read
/// side both fail, the write-side error wins.
pub async fn stream_to<S, D>(src: &mut S, dst: &mut D, buffer_size: usize) -> Result<()>
where
    S: File + ?Sized,
    D: File + ?Sized,
{
    if src.cursor() != 0 {
        return Err(crate::errors::Error::copy_refused());
    }

    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied: u64 = 0;
    loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = dst.close().await;
                let _ = src.close().await;
                return Err(e);
            }
        };
        let mut written = 0;
        while written < n {
            match dst.write(&buf[written..n]).await {
                Ok(w) => written += w,
                Err(e) => {
                    let _ = dst.close().await;
                    let _ = src.close().await;
                    return Err(e);
                }
            }
        }
        copied += n as u64;
    }

    if copied == 0 {
        if let Err(e) = dst.touch().await {
            let _ = dst.close().await;
            let _ = src.close().await;
            return Err(e);
        }
    }

    debug!(bytes = copied, "stream copy complete");

    let write_close = dst.close().await;
    let read_close = src.close().await;
    write_close?;
    read_close
}
