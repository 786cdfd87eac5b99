use serde::{
    de::Unexpected, ser::SerializeStruct, Deserialize, Serialize, Serializer,
};

use super::{mask, BitVector, MAX_WIDTH};

impl Serialize for BitVector {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut fields = serializer.serialize_struct("BitVector", 2)?;
        fields.serialize_field("width", &self.width)?;
        fields.serialize_field("bits", &self.bits)?;
        fields.end()
    }
}

// A derived deserializer on an intermediate struct, so that we get to look
// at the raw fields before they become a `BitVector`. Input carrying bits
// above its width is rejected rather than silently truncated.
#[derive(Deserialize)]
#[serde(rename = "BitVector")]
struct SerializedBitVector {
    width: u32,
    bits: u64,
}

impl<'de> Deserialize<'de> for BitVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let raw = SerializedBitVector::deserialize(deserializer)?;
        if raw.width > MAX_WIDTH {
            return Err(Error::invalid_value(
                Unexpected::Unsigned(raw.width as u64),
                &"a width of at most 64 bits",
            ));
        }
        if raw.bits & !mask(raw.width) != 0 {
            return Err(Error::invalid_value(
                Unexpected::Unsigned(raw.bits),
                &format!("a value that fits in {} bits", raw.width).as_str(),
            ));
        }
        Ok(BitVector::new(raw.width, raw.bits))
    }
}
