use crate::codec::Codec;
use crate::decoder::{DecodeError, DecodeRequest, Decoder};
use vectorcheck_ipc::DecodedOutput;

/// Self-test decoder for the `Dummy` codec: the "decoded" checksum is the
/// MD5 of the input bitstream itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dummy;

impl Decoder for Dummy {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn codec(&self) -> Codec {
        Codec::Dummy
    }

    fn description(&self) -> &str {
        "This is a dummy implementation for the dummy codec"
    }

    fn decode(&self, request: &DecodeRequest<'_>) -> Result<DecodedOutput, DecodeError> {
        let checksum = super::file_md5(request.input)?;
        Ok(DecodedOutput::Checksum(checksum))
    }
}
