use camino::Utf8Path;

use crate::error::Gcmt3dError;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Array {
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({n},)"),
            dims => format!(
                "({})",
                dims.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {shape}, }}");
        let unpadded = MAGIC.len() + 4 + header.len() + 1;
        let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
        header.push_str(&" ".repeat(padding));
        header.push('\n');

        let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + self.data.len() * 8);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8], path: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let format_err = |message: &str| Gcmt3dError::ArtifactFormat {
            path: path.to_owned(),
            message: message.to_string(),
        };

        if bytes.len() < 10 || &bytes[..6] != MAGIC {
            return Err(format_err("not an npy file"));
        }
        let (header_len, header_start) = match bytes[6] {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 if bytes.len() >= 12 => (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            ),
            _ => return Err(format_err("unsupported npy version")),
        };
        let data_start = header_start + header_len;
        let header = bytes
            .get(header_start..data_start)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .ok_or_else(|| format_err("truncated header"))?;

        let descr = dict_value(header, "descr")
            .and_then(|value| value.strip_prefix('\''))
            .and_then(|value| value.split('\'').next())
            .ok_or_else(|| format_err("missing descr"))?;
        if descr != "<f8" {
            return Err(format_err("only little-endian float64 arrays are supported"));
        }
        let fortran_order = dict_value(header, "fortran_order")
            .map(|value| value.starts_with("True"))
            .unwrap_or(false);

        let shape_text = dict_value(header, "shape")
            .and_then(|value| value.strip_prefix('('))
            .and_then(|value| value.split(')').next())
            .ok_or_else(|| format_err("missing shape"))?;
        let shape = shape_text
            .split(',')
            .map(str::trim)
            .filter(|dim| !dim.is_empty())
            .map(|dim| dim.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format_err("invalid shape"))?;
        if fortran_order && shape.len() > 1 {
            return Err(format_err("fortran-ordered arrays are not supported"));
        }

        let byte_len = shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
            .and_then(|count| count.checked_mul(8))
            .ok_or_else(|| format_err("invalid shape"))?;
        let payload = &bytes[data_start..];
        if payload.len() != byte_len {
            return Err(format_err("payload length does not match shape"));
        }
        let data = payload
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Ok(Self { shape, data })
    }
}

fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let start = header.find(&needle)? + needle.len();
    Some(header[start..].trim_start())
}
