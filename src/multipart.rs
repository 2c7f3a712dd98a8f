//! Minimal `multipart/form-data` encoder.
//!
//! The preprocessing API only ever receives text fields, so there is no
//! file-part support.

use uuid::Uuid;

pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Start a form with a fresh random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("Boundary-{}", Uuid::new_v4()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into(), body: Vec::new() }
    }

    /// Append a UTF-8 text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Value for the `Content-Type` request header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Close the form and return the request body.
    pub fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_text_field() {
        let form = MultipartForm::with_boundary("XYZ").text("text", "Բարև");
        assert_eq!(form.content_type(), "multipart/form-data; boundary=XYZ");
        let body = String::from_utf8(form.finish()).unwrap();
        assert_eq!(
            body,
            "--XYZ\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nԲարև\r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn test_random_boundaries_differ() {
        let a = MultipartForm::new().content_type();
        let b = MultipartForm::new().content_type();
        assert!(a.starts_with("multipart/form-data; boundary=Boundary-"));
        assert_ne!(a, b);
    }
}
