use relay_api::{Framing, RelayError};

/// Максимальная длина фрейма по умолчанию: запись телеметрии — пара сотен байт.
pub const DEFAULT_MAX_LENGTH: usize = 64 * 1024;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct LinesConfig {
    /// Максимальная длина строки в байтах (0 = без ограничения).
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for LinesConfig {
    fn default() -> Self {
        Self { max_length: default_max_length() }
    }
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

/// Один фрейм = одна строка, завершённая `\n` (`\r\n` тоже допускается).
#[derive(Debug, Clone)]
pub struct LinesFraming {
    max_length: usize,
}

impl LinesFraming {
    pub fn new(config: &LinesConfig) -> Self {
        Self { max_length: config.max_length }
    }

    fn check_length(&self, len: usize, what: &str) -> Result<(), RelayError> {
        if self.max_length != 0 && len > self.max_length {
            return Err(RelayError::decode(format!(
                "{what} of {len} bytes exceeds max_length {}",
                self.max_length
            )));
        }
        Ok(())
    }
}

impl Default for LinesFraming {
    fn default() -> Self {
        Self::new(&LinesConfig::default())
    }
}

impl Framing for LinesFraming {
    fn decode(&self, buf: &[u8]) -> Result<Option<(Vec<u8>, usize)>, RelayError> {
        match buf.iter().position(|&b| b == b'\n') {
            // Строка ещё не пришла целиком: копим, но не бесконечно
            None => {
                self.check_length(buf.len(), "unterminated line")?;
                Ok(None)
            }
            Some(end) => {
                let line = buf[..end].strip_suffix(b"\r").unwrap_or(&buf[..end]);
                self.check_length(line.len(), "line")?;
                Ok(Some((line.to_vec(), end + 1)))
            }
        }
    }

    fn encode(&self, data: &[u8], buf: &mut Vec<u8>) -> Result<(), RelayError> {
        if data.contains(&b'\n') {
            return Err(RelayError::encode("frame payload contains a newline"));
        }
        buf.reserve(data.len() + 1);
        buf.extend_from_slice(data);
        buf.push(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_consecutive_lines() {
        let f = LinesFraming::default();
        let buf = b"{\"a\":1}\n{\"b\":2}\r\npartial";
        let (first, used) = f.decode(buf).unwrap().unwrap();
        assert_eq!(first, b"{\"a\":1}");
        let (second, used2) = f.decode(&buf[used..]).unwrap().unwrap();
        assert_eq!(second, b"{\"b\":2}");
        assert_eq!(f.decode(&buf[used + used2..]).unwrap(), None);
    }

    #[test]
    fn empty_line_is_an_empty_frame() {
        let f = LinesFraming::default();
        assert_eq!(f.decode(b"\n").unwrap(), Some((Vec::new(), 1)));
    }

    #[test]
    fn oversized_partial_line_fails() {
        let f = LinesFraming::new(&LinesConfig { max_length: 4 });
        assert!(f.decode(b"abcdef").is_err());
        assert!(f.decode(b"abcdef\n").is_err());
        assert_eq!(f.decode(b"abcd\n").unwrap(), Some((b"abcd".to_vec(), 5)));
    }

    #[test]
    fn encode_appends_terminator() {
        let f = LinesFraming::default();
        let mut out = Vec::new();
        f.encode(b"x", &mut out).unwrap();
        f.encode(b"y", &mut out).unwrap();
        assert_eq!(out, b"x\ny\n");
        let e = f.encode(b"a\nb", &mut out).unwrap_err();
        assert_eq!(e.kind(), relay_api::ErrorKind::Encode);
    }
}
