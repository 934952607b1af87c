//! Shared test fixtures: synthetic frames, ICY responses and a scripted server.
//!
//! Used by multiple test modules to avoid duplication.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo, no padding.
pub const MP3_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];

/// Length of a frame starting with [`MP3_HEADER`].
pub const MP3_FRAME_LEN: usize = 417;

/// Payload filler that never contains 0xFF, so it cannot fake a sync word.
fn filler(len: usize, seed: usize) -> impl Iterator<Item = u8> {
    (0..len).map(move |i| ((i + seed) % 251) as u8)
}

/// Builds `count` back-to-back MP3 frames.
pub fn mp3_frames(count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * MP3_FRAME_LEN);
    for n in 0..count {
        out.extend_from_slice(&MP3_HEADER);
        out.extend(filler(MP3_FRAME_LEN - MP3_HEADER.len(), n));
    }
    out
}

/// Builds an ADTS header without CRC.
pub fn adts_header(profile: u8, freq_index: u8, channel_config: u8, frame_length: usize) -> [u8; 7] {
    let len = frame_length as u16;
    [
        0xFF,
        0xF1,
        (profile << 6) | (freq_index << 2) | (channel_config >> 2),
        ((channel_config & 0x03) << 6) | ((len >> 11) & 0x03) as u8,
        ((len >> 3) & 0xFF) as u8,
        (((len & 0x07) as u8) << 5) | 0x1F,
        0xFC,
    ]
}

/// Builds `count` ADTS LC stereo frames (frequency index 7) of `frame_length` bytes.
pub fn adts_frames(count: usize, frame_length: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * frame_length);
    for n in 0..count {
        out.extend_from_slice(&adts_header(1, 7, 2, frame_length));
        out.extend(filler(frame_length - 7, n));
    }
    out
}

/// Encodes an ICY metadata block: length byte then text padded to 16-byte units.
pub fn metadata_block(text: &str) -> Vec<u8> {
    let units = text.len().div_ceil(16);
    let mut out = Vec::with_capacity(units * 16 + 1);
    out.push(units as u8);
    out.extend_from_slice(text.as_bytes());
    out.resize(units * 16 + 1, 0);
    out
}

/// Inserts a metadata block after every `metaint` bytes of `audio`.
///
/// `block` receives the zero-based block index.
pub fn interleave_metadata(
    audio: &[u8],
    metaint: usize,
    mut block: impl FnMut(usize) -> Vec<u8>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(audio.len() + audio.len() / metaint * 32);
    for (index, chunk) in audio.chunks(metaint).enumerate() {
        out.extend_from_slice(chunk);
        if chunk.len() == metaint {
            out.extend(block(index));
        }
    }
    out
}

/// Encodes `payload` with chunked transfer encoding, lower-case hex sizes.
pub fn chunk_encode(payload: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / chunk_size * 8 + 8);
    for chunk in payload.chunks(chunk_size) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// Builds an `ICY 200 OK` MP3 response head with the given metadata interval.
pub fn icy_head(metaint: usize) -> String {
    format!(
        "ICY 200 OK\r\nicy-name:Test\r\nicy-genre:Pop\r\nicy-br:128\r\nicy-metaint:{metaint}\r\ncontent-type:audio/mpeg\r\n\r\n"
    )
}

/// Concatenates a response head and body.
pub fn response(head: &str, body: &[u8]) -> Vec<u8> {
    let mut out = head.as_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

/// Scripted TCP server: the Nth connection receives the Nth response, then
/// the socket is closed. Request heads are recorded in arrival order.
pub struct ScriptedServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    pub async fn start(responses: Vec<Vec<u8>>) -> Self {
        Self::serve(responses, None).await
    }

    /// Like [`start`](Self::start), but response `held` is only written once
    /// `release` fires. Its request head is still read and recorded.
    pub async fn start_held(
        responses: Vec<Vec<u8>>,
        held: usize,
        release: oneshot::Receiver<()>,
    ) -> Self {
        Self::serve(responses, Some((held, release))).await
    }

    async fn serve(
        responses: Vec<Vec<u8>>,
        mut hold: Option<(usize, oneshot::Receiver<()>)>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            for (index, body) in responses.into_iter().enumerate() {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut head = Vec::new();
                let mut byte = [0u8; 1];
                while !head.ends_with(b"\r\n\r\n") {
                    match socket.read(&mut byte).await {
                        Ok(1) => head.push(byte[0]),
                        _ => break,
                    }
                }
                recorded.lock().push(String::from_utf8_lossy(&head).into_owned());
                if hold.as_ref().is_some_and(|(held, _)| *held == index) {
                    if let Some((_, release)) = hold.take() {
                        let _ = release.await;
                    }
                }
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    /// Base URL of the server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}
