use super::RequestBody;

/// A file to upload into a container field.
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerFile {
    /// The file name stored with the container data.
    pub name: String,
    /// The MIME type of the data.
    pub mime_type: String,
    /// The file contents.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ContainerFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ContainerFile {
    /// A file with the given name, type and contents.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Encode as a single `upload` part of a `multipart/form-data` body.
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let name = self
            .name
            .replace('"', "%22")
            .replace('\r', "%0D")
            .replace('\n', "%0A");

        let mut out = Vec::with_capacity(self.data.len() + 256);
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"upload\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", self.mime_type).as_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        out
    }

    /// Encode as a request body with a fresh boundary.
    pub fn into_body(self) -> RequestBody {
        let boundary = format!("fmdata-{}", uuid::Uuid::new_v4().simple());
        let data = self.encode(&boundary);
        RequestBody::Multipart { boundary, data }
    }
}
