//! Request dispatch: one decoded [`Request`] in, one [`Response`] out.

use remora_kernel::Session;
use remora_types::{Errno, OpenMode, Request, Response, Whence};

/// Run `request` against the session and wrap the result for the wire.
///
/// Raw mode and whence values are converted here; an unknown enumerant is
/// answered with `EINVAL` without touching the service.
pub async fn dispatch(session: &Session, request: Request) -> Response {
    let invalid = request.failure(Errno::EINVAL);
    match request {
        Request::Open { path, mode } => match OpenMode::try_from(mode) {
            Ok(mode) => Response::Status(session.open(path.as_deref(), mode).await.into()),
            Err(e) => {
                tracing::debug!(session = session.id(), ?path, "open rejected: {e}");
                invalid
            }
        },
        Request::Close { fd } => Response::Status(session.close(fd).await.into()),
        Request::Write { fd, data } => Response::Status(session.write(fd, &data).await),
        Request::Read { fd, capacity } => {
            let (result, bytes) = session.read(fd, capacity).await;
            Response::Data { result, bytes }
        }
        Request::Lseek { fd, offset, whence } => match Whence::try_from(whence) {
            Ok(whence) => Response::Status(session.lseek(fd, offset, whence).await),
            Err(e) => {
                tracing::debug!(session = session.id(), fd, "lseek rejected: {e}");
                invalid
            }
        },
        Request::Unlink { path } => Response::Status(session.unlink(path.as_deref()).await.into()),
        Request::Stat { path } => {
            let (result, attr) = session.stat(path.as_deref()).await;
            Response::Attr {
                result: result.into(),
                attr,
            }
        }
        Request::GetDirEntries { fd, nbytes, base } => {
            let (result, base, entries) = session.get_dir_entries(fd, nbytes, base).await;
            Response::Entries {
                result,
                base,
                entries,
            }
        }
        Request::GetDirTree { path } => {
            let (result, tree) = session.get_dir_tree(path.as_deref()).await;
            Response::Tree {
                result: result.into(),
                tree,
            }
        }
    }
}
