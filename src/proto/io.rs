//! Socket driver (`spec.md` §4.2): pumps bytes between the codec's output
//! window / `feed_input` and a caller-owned `AsyncRead + AsyncWrite` socket.
//!
//! Generalized from the teacher's `proto::framed_write::FramedWrite` (drain
//! loop, `Poll::Pending` propagation, zero-write detection) and
//! `codec::framed_read::FramedRead` (fixed-size scratch read loop), merged
//! into one driver since this spec has no `Sink`/`Stream` split to preserve.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::codec::{Session, SessionCallbacks};
use crate::error::Error;

const READ_CHUNK: usize = 16 * 1024;

pub struct Io<T> {
    socket: T,
    scratch: Box<[u8]>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Io<T> {
    pub fn new(socket: T) -> Io<T> {
        Io::with_chunk_size(socket, READ_CHUNK)
    }

    /// `read_chunk_size` from `client::Builder` (`spec.md` §4.2 step 2):
    /// the scratch buffer size used for each `poll_read`.
    pub fn with_chunk_size(socket: T, chunk_size: usize) -> Io<T> {
        Io {
            socket,
            scratch: vec![0u8; chunk_size].into_boxed_slice(),
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.socket
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.socket
    }

    pub fn into_inner(self) -> T {
        self.socket
    }

    /// Drains `session`'s output window into the socket until it empties or
    /// the socket would block. A partial write is recorded on the session
    /// via `advance_output` before this returns, so the next call resumes
    /// from where it left off (`spec.md` §4.2's write-side algorithm).
    pub fn poll_write_ready(&mut self, cx: &mut Context<'_>, session: &mut Session) -> Poll<Result<(), Error>> {
        while session.wants_write() {
            let buf = session.get_output_window();
            match Pin::new(&mut self.socket).poll_write(cx, buf) {
                Poll::Ready(Ok(0)) => {
                    let err = io::Error::new(io::ErrorKind::WriteZero, "socket accepted zero bytes");
                    return Poll::Ready(Err(err.into()));
                }
                Poll::Ready(Ok(n)) => session.advance_output(n),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                Poll::Pending => return Poll::Pending,
            }
        }

        Poll::Ready(Ok(()))
    }

    /// Reads as many bytes as are immediately available and feeds each
    /// completed frame to `session`, firing `cb` along the way. Returns the
    /// number of bytes consumed this call; `0` only ever means "read, got
    /// nothing new, nothing more to do right now" is signalled as `Pending`
    /// instead, so a `Ready(Ok(0))` never escapes this function.
    pub fn poll_read_ready<C: SessionCallbacks>(
        &mut self,
        cx: &mut Context<'_>,
        session: &mut Session,
        cb: &mut C,
    ) -> Poll<Result<usize, Error>> {
        let mut total = 0;
        let chunk_size = self.scratch.len();

        loop {
            let mut read_buf = ReadBuf::new(self.scratch.as_mut());

            match Pin::new(&mut self.socket).poll_read(cx, &mut read_buf) {
                Poll::Ready(Ok(())) => {
                    let n = read_buf.filled().len();

                    if n == 0 {
                        if total == 0 {
                            let err = io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection");
                            return Poll::Ready(Err(err.into()));
                        }
                        return Poll::Ready(Ok(total));
                    }

                    if let Err(e) = session.feed_input(read_buf.filled(), cb) {
                        return Poll::Ready(Err(e));
                    }

                    total += n;

                    if n < chunk_size {
                        // short read: the socket has nothing more buffered
                        return Poll::Ready(Ok(total));
                    }
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                Poll::Pending => {
                    if total > 0 {
                        return Poll::Ready(Ok(total));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
