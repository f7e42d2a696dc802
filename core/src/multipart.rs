//! Streaming `multipart/form-data` writer.
//!
//! Parts are written straight into the underlying `io::Write` in the order
//! they are created; only the part currently being written is open. The
//! layout follows RFC 7578: every part starts with a dash boundary line and
//! its headers, and `close` writes the terminating `--boundary--` line.

use std::io::{self, Write};

use uuid::Uuid;

pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    has_parts: bool,
}

impl<W: Write> MultipartWriter<W> {
    /// Create a writer with a random boundary.
    pub fn new(inner: W) -> Self {
        Self::with_boundary(inner, Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(inner: W, boundary: impl Into<String>) -> Self {
        Self {
            inner,
            boundary: boundary.into(),
            has_parts: false,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value matching this writer's boundary.
    pub fn form_data_content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Write a complete text field.
    pub fn write_field(&mut self, name: &str, value: &str) -> io::Result<()> {
        let mut part = self.create_form_field(name)?;
        part.write_all(value.as_bytes())
    }

    /// Start a field whose content is written through the returned part.
    pub fn create_form_field(&mut self, name: &str) -> io::Result<Part<'_, W>> {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.create_part(&[("Content-Disposition", disposition)])
    }

    /// Start a file part with `Content-Type: application/octet-stream`.
    pub fn create_form_file(&mut self, field: &str, file_name: &str) -> io::Result<Part<'_, W>> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field),
            escape_quotes(file_name)
        );
        self.create_part(&[
            ("Content-Disposition", disposition),
            ("Content-Type", "application/octet-stream".to_string()),
        ])
    }

    fn create_part(&mut self, headers: &[(&str, String)]) -> io::Result<Part<'_, W>> {
        let mut head = String::new();
        if self.has_parts {
            head.push_str("\r\n");
        }
        head.push_str("--");
        head.push_str(&self.boundary);
        head.push_str("\r\n");
        for (name, value) in headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        self.inner.write_all(head.as_bytes())?;
        self.has_parts = true;
        Ok(Part {
            inner: &mut self.inner,
        })
    }

    /// Write the closing boundary and hand back the underlying writer.
    pub fn close(mut self) -> io::Result<W> {
        let tail = if self.has_parts {
            format!("\r\n--{}--\r\n", self.boundary)
        } else {
            format!("--{}--\r\n", self.boundary)
        };
        self.inner.write_all(tail.as_bytes())?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// The content writer of the part most recently created.
pub struct Part<'a, W> {
    inner: &'a mut W,
}

impl<W: Write> Write for Part<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
