//! Transformation Body Codec
//!
//! Wire layout: one format byte, then the body. Format 1 is postcard.

use crate::error::RegistryError;
use feature_model::TransformBody;

/// Format byte of postcard-encoded bodies
pub const FORMAT_POSTCARD: u8 = 1;

pub fn encode_body(body: &TransformBody) -> Result<Vec<u8>, RegistryError> {
    let encoded = postcard::to_allocvec(body)
        .map_err(|e| RegistryError::SerializationError(format!("Body encode failed: {}", e)))?;

    let mut bytes = Vec::with_capacity(encoded.len() + 1);
    bytes.push(FORMAT_POSTCARD);
    bytes.extend_from_slice(&encoded);
    Ok(bytes)
}

pub fn decode_body(bytes: &[u8]) -> Result<TransformBody, RegistryError> {
    match bytes.split_first() {
        Some((&FORMAT_POSTCARD, rest)) => postcard::from_bytes(rest)
            .map_err(|e| RegistryError::SerializationError(format!("Body decode failed: {}", e))),
        Some((format, _)) => Err(RegistryError::SerializationError(format!(
            "Unknown body format {}",
            format
        ))),
        None => Err(RegistryError::SerializationError(
            "Empty transformation body".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_model::{ExpressionBody, TransformRef};

    #[test]
    fn test_round_trip() {
        let body = TransformBody::Expression(
            ExpressionBody::new().with_output("conv_rate_plus_100", "conv_rate + 100"),
        );
        let bytes = encode_body(&body).unwrap();
        assert_eq!(bytes[0], FORMAT_POSTCARD);
        assert_eq!(decode_body(&bytes).unwrap(), body);

        let body = TransformBody::Registered(TransformRef {
            name: "add_value".to_string(),
            version: 2,
        });
        assert_eq!(decode_body(&encode_body(&body).unwrap()).unwrap(), body);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut bytes = encode_body(&TransformBody::Expression(ExpressionBody::new())).unwrap();
        bytes[0] = 7;
        assert!(matches!(
            decode_body(&bytes),
            Err(RegistryError::SerializationError(_))
        ));
        assert!(matches!(
            decode_body(&[]),
            Err(RegistryError::SerializationError(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let bytes = encode_body(&TransformBody::Expression(
            ExpressionBody::new().with_output("a", "b * 2"),
        ))
        .unwrap();
        assert!(decode_body(&bytes[..bytes.len() - 2]).is_err());
    }
}
