use std::io::{self, Read, Write};

use bytes::Bytes;
use rand::RngExt;

const BOUNDARY_BYTES: usize = 30;

#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Buffered(Bytes),
    Reader(Box<dyn Read + Send + Sync>),
}

impl RequestBody {
    /// A second copy of the body for replaying it on a redirect. Reader
    /// bodies are consumed by the first send and cannot be replayed.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::Empty),
            Self::Buffered(bytes) => Some(Self::Buffered(bytes.clone())),
            Self::Reader(_) => None,
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => formatter.write_str("Empty"),
            Self::Buffered(bytes) => formatter
                .debug_tuple("Buffered")
                .field(&bytes.len())
                .finish(),
            Self::Reader(_) => formatter.write_str("Reader(..)"),
        }
    }
}

fn random_boundary() -> String {
    let mut rng = rand::rng();
    (0..BOUNDARY_BYTES)
        .map(|_| format!("{:02x}", rng.random_range(0..=u8::MAX)))
        .collect()
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// In-memory `multipart/form-data` encoder.
pub(crate) struct MultipartWriter {
    boundary: String,
    buffer: Vec<u8>,
}

impl MultipartWriter {
    pub(crate) fn new() -> Self {
        Self::with_boundary(random_boundary())
    }

    pub(crate) fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buffer: Vec::new(),
        }
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn begin_part(&mut self, disposition: &str, content_type: Option<&str>) -> io::Result<()> {
        write!(self.buffer, "--{}\r\n", self.boundary)?;
        write!(self.buffer, "Content-Disposition: {disposition}\r\n")?;
        if let Some(content_type) = content_type {
            write!(self.buffer, "Content-Type: {content_type}\r\n")?;
        }
        self.buffer.write_all(b"\r\n")
    }

    pub(crate) fn write_field(&mut self, name: &str, value: &str) -> io::Result<()> {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.begin_part(&disposition, None)?;
        self.buffer.write_all(value.as_bytes())?;
        self.buffer.write_all(b"\r\n")
    }

    pub(crate) fn write_file<R>(&mut self, field: &str, filename: &str, reader: &mut R) -> io::Result<()>
    where
        R: Read + ?Sized,
    {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field),
            escape_quotes(filename)
        );
        self.begin_part(&disposition, Some("application/octet-stream"))?;
        io::copy(reader, &mut self.buffer)?;
        self.buffer.write_all(b"\r\n")
    }

    pub(crate) fn finish(mut self) -> io::Result<(String, Bytes)> {
        write!(self.buffer, "--{}--\r\n", self.boundary)?;
        let content_type = self.content_type();
        Ok((content_type, Bytes::from(self.buffer)))
    }
}
