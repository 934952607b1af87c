//! HTTP/ICY connection negotiation.
//!
//! Sends the stream request, reads the response head byte-by-byte up to the
//! blank line, follows redirects and turns the headers into station and
//! audio descriptions plus a ready [`TransportReader`].

use tokio::net::TcpStream;
use url::{Host, Url};

use crate::audio::{AudioFormat, ServerType, StationInfo};
use crate::config::ConnectionSettings;
use crate::error::{ConnectError, ConnectResult};
use crate::protocol_constants::{DEFAULT_HTTP_PORT, HEADER_TERMINATOR, MAX_RESPONSE_HEAD_SIZE};
use crate::transport::{select_transport, IdentityTransport, TransportReader};
use crate::utils::starts_with_ignore_ascii_case;

// ─────────────────────────────────────────────────────────────────────────────
// Response Head
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed status line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// `HTTP/1.1`, `HTTP/1.0` or `ICY`.
    pub protocol: String,
    pub status: u16,
    pub reason: String,
    /// Headers in arrival order, names as sent.
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Parses a raw response head.
    pub fn parse(raw: &str) -> ConnectResult<Self> {
        let mut lines = raw.split('\n').map(|line| line.trim_end_matches('\r'));
        let status_line = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| ConnectError::MalformedResponse("empty status line".to_string()))?;

        let mut parts = status_line.splitn(3, ' ');
        let protocol = parts.next().unwrap_or_default();
        if !starts_with_ignore_ascii_case(protocol, "HTTP/")
            && !protocol.eq_ignore_ascii_case("ICY")
        {
            return Err(ConnectError::MalformedResponse(format!(
                "unknown protocol in status line: {status_line:?}"
            )));
        }
        let status = parts
            .next()
            .and_then(|code| code.trim().parse::<u16>().ok())
            .ok_or_else(|| {
                ConnectError::MalformedResponse(format!("bad status code: {status_line:?}"))
            })?;
        let reason = parts.next().unwrap_or_default().trim().to_string();

        let headers = lines
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        Ok(Self {
            protocol: protocol.to_ascii_uppercase(),
            status,
            reason,
            headers,
        })
    }

    /// Looks up a header value (case-insensitive name match, first wins).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if any `ice-*` header was sent.
    #[must_use]
    pub fn is_icecast(&self) -> bool {
        self.headers
            .iter()
            .any(|(key, _)| starts_with_ignore_ascii_case(key, "ice-"))
    }
}

/// What to do with a response.
#[derive(Debug)]
pub enum StatusAction {
    Success,
    Redirect(String),
    Fail(ConnectError),
}

/// Classifies a response by status code.
#[must_use]
pub fn classify(head: &ResponseHead) -> StatusAction {
    match head.status {
        200 => StatusAction::Success,
        301 | 302 | 303 | 307 | 308 => match head.header("location") {
            Some(location) if !location.is_empty() => StatusAction::Redirect(location.to_string()),
            _ => StatusAction::Fail(ConnectError::UnexpectedStatus {
                code: head.status,
                reason: format!("{} without Location", head.reason),
            }),
        },
        400 | 404 => StatusAction::Fail(ConnectError::StationUnavailable(head.status)),
        503 => StatusAction::Fail(ConnectError::ListenerLimitReached),
        code => StatusAction::Fail(ConnectError::UnexpectedStatus {
            code,
            reason: head.reason.clone(),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Icecast audio info
// ─────────────────────────────────────────────────────────────────────────────

/// Values from an `ice-audio-info` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IceAudioInfo {
    pub bit_rate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl IceAudioInfo {
    /// Parses `ice-bitrate=32;ice-samplerate=32000;ice-channels=2`.
    ///
    /// Bare `bitrate`/`samplerate`/`channels` keys are accepted too; unknown
    /// keys and unparsable values are skipped.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let mut info = Self::default();
        for pair in value.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let key = key.strip_prefix("ice-").unwrap_or(&key);
            let value = value.trim();
            match key {
                "bitrate" => info.bit_rate = value.parse().ok(),
                "samplerate" => info.sample_rate = value.parse().ok(),
                "channels" => info.channels = value.parse().ok(),
                _ => {}
            }
        }
        info
    }

    /// Returns true if sample rate and channel count are both known.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sample_rate.is_some() && self.channels.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Negotiation
// ─────────────────────────────────────────────────────────────────────────────

/// A successfully negotiated stream, ready for sample production.
pub struct Negotiated {
    /// URL that answered 200, after redirects.
    pub url: Url,
    pub station: StationInfo,
    pub format: AudioFormat,
    /// Bit rate declared by `icy-br` or `ice-audio-info` (kbps).
    pub declared_bit_rate: Option<u32>,
    pub ice_audio_info: Option<IceAudioInfo>,
    /// Bytes between metadata blocks; 0 disables demuxing.
    pub metadata_interval: usize,
    pub transport: Box<dyn TransportReader>,
}

impl std::fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiated")
            .field("url", &self.url.as_str())
            .field("station", &self.station)
            .field("format", &self.format)
            .field("declared_bit_rate", &self.declared_bit_rate)
            .field("metadata_interval", &self.metadata_interval)
            .finish_non_exhaustive()
    }
}

/// Builds the request for `url`.
#[must_use]
pub fn build_request(url: &Url, settings: &ConnectionSettings) -> String {
    let mut path = format!("{}{}", url.path(), settings.relative_path);
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    let host = url.host_str().unwrap_or_default();
    let port = url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);
    let host_header = if port == DEFAULT_HTTP_PORT {
        host.to_string()
    } else {
        format!("{host}:{port}")
    };

    format!(
        "GET {path} HTTP/1.1\r\n\
         Icy-MetaData: {}\r\n\
         Host: {host_header}\r\n\
         Connection: Keep-Alive\r\n\
         User-Agent: {}\r\n\
         \r\n",
        u8::from(settings.request_metadata),
        settings.user_agent
    )
}

/// Connects to `url`, following redirects, and parses the stream headers.
pub async fn negotiate(url: &Url, settings: &ConnectionSettings) -> ConnectResult<Negotiated> {
    let mut current = url.clone();
    let mut hops: u8 = 0;

    loop {
        let (head, transport) = open(&current, settings).await?;
        match classify(&head) {
            StatusAction::Success => return accept(current, &head, transport, settings),
            StatusAction::Redirect(location) => {
                if hops >= settings.max_redirects {
                    log::warn!("[Http] Too many redirects, last Location: {}", location);
                    return Err(ConnectError::RedirectLoop(hops));
                }
                hops += 1;
                let next = current
                    .join(&location)
                    .map_err(|e| ConnectError::InvalidUrl(format!("{location}: {e}")))?;
                log::info!(
                    "[Http] {} redirected to {} ({}/{})",
                    current,
                    next,
                    hops,
                    settings.max_redirects
                );
                current = next;
            }
            StatusAction::Fail(e) => {
                log::warn!("[Http] {} refused: {}", current, e);
                return Err(e);
            }
        }
    }
}

/// Opens a socket, sends the request and reads the response head.
async fn open(
    url: &Url,
    settings: &ConnectionSettings,
) -> ConnectResult<(ResponseHead, IdentityTransport<TcpStream>)> {
    if url.scheme() != "http" {
        return Err(ConnectError::InvalidUrl(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return Err(ConnectError::InvalidUrl(format!("{url} has no host"))),
    };
    let port = url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);

    log::debug!("[Http] Connecting to {}:{}", host, port);
    let mut stream = tokio::time::timeout(
        settings.connect_timeout(),
        TcpStream::connect((host.as_str(), port)),
    )
    .await
    .map_err(|_| ConnectError::Unreachable(format!("connect to {host}:{port} timed out")))?
    .map_err(|e| ConnectError::Unreachable(format!("{host}:{port}: {e}")))?;

    let request = build_request(url, settings);
    tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes()).await?;

    let mut transport = IdentityTransport::new(stream);
    let raw = tokio::time::timeout(settings.read_timeout(), read_head(&mut transport))
        .await
        .map_err(|_| ConnectError::Unreachable("timed out waiting for response".to_string()))??;
    let head = ResponseHead::parse(&raw)?;
    log::debug!("[Http] {} {} {}", head.protocol, head.status, head.reason);

    Ok((head, transport))
}

/// Reads bytes until the blank line that ends the response head.
async fn read_head(transport: &mut dyn TransportReader) -> ConnectResult<String> {
    let mut head = Vec::with_capacity(512);
    while !head.ends_with(HEADER_TERMINATOR) {
        if head.len() >= MAX_RESPONSE_HEAD_SIZE {
            return Err(ConnectError::MalformedResponse(format!(
                "response head exceeds {MAX_RESPONSE_HEAD_SIZE} bytes"
            )));
        }
        if transport.load(1).await.map_err(|e| ConnectError::Unreachable(e.to_string()))? == 0 {
            return Err(ConnectError::MalformedResponse(
                "connection closed before end of headers".to_string(),
            ));
        }
        head.push(
            transport
                .read_byte()
                .map_err(|e| ConnectError::Unreachable(e.to_string()))?,
        );
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Interprets a 200 response.
fn accept(
    url: Url,
    head: &ResponseHead,
    transport: IdentityTransport<TcpStream>,
    settings: &ConnectionSettings,
) -> ConnectResult<Negotiated> {
    let content_type = head
        .header("content-type")
        .ok_or(ConnectError::MissingHeader("content-type"))?;
    let format = AudioFormat::from_content_type(content_type)
        .ok_or_else(|| ConnectError::UnsupportedContentType(content_type.to_string()))?;

    let metadata_interval = match head.header("icy-metaint") {
        Some(value) if settings.request_metadata => {
            value.parse::<usize>().map_err(|_| ConnectError::InvalidHeader {
                name: "icy-metaint",
                value: value.to_string(),
            })?
        }
        _ => 0,
    };

    let ice_audio_info = head.header("ice-audio-info").map(IceAudioInfo::parse);
    let icy_bit_rate = head.header("icy-br").and_then(|value| {
        let first = value.split(',').next().unwrap_or_default().trim();
        let parsed = first.parse::<u32>().ok();
        if parsed.is_none() {
            log::warn!("[Http] Ignoring unparsable icy-br {:?}", value);
        }
        parsed
    });
    let declared_bit_rate = icy_bit_rate
        .filter(|&br| br > 0)
        .or_else(|| ice_audio_info.and_then(|info| info.bit_rate));

    if format.is_aac() && declared_bit_rate.is_none() {
        return Err(ConnectError::UnknownBitRate);
    }

    let station = StationInfo {
        name: head.header("icy-name").unwrap_or_default().to_string(),
        genre: head.header("icy-genre").unwrap_or_default().to_string(),
        description: head.header("icy-description").unwrap_or_default().to_string(),
        server_type: if head.is_icecast() {
            ServerType::Icecast
        } else {
            ServerType::Shoutcast
        },
    };

    log::info!(
        "[Http] Connected to {:?} ({}, {} kbps, metaint {})",
        station.name,
        format,
        declared_bit_rate.unwrap_or(0),
        metadata_interval
    );

    let transport = select_transport(
        transport,
        head.header("transfer-encoding"),
        settings.initial_buffering,
    );

    Ok(Negotiated {
        url,
        station,
        format,
        declared_bit_rate,
        ice_audio_info,
        metadata_interval,
        transport,
    })
}
