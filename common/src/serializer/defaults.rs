use super::{Reader, ReaderError, Serializer, Writer};
use indexmap::IndexSet;
use std::{
    borrow::Cow,
    collections::HashSet,
    hash::Hash as StdHash,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

// Maximum number of elements accepted in a length-prefixed collection.
// Prevents a hostile peer from forcing a huge allocation with a tiny frame.
pub const MAX_ITEMS_COLLECTION: usize = u16::MAX as usize;

impl Serializer for u8 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u8()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self);
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for u16 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u16()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u16(*self);
    }

    fn size(&self) -> usize {
        2
    }
}

impl Serializer for u32 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u32()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(self);
    }

    fn size(&self) -> usize {
        4
    }
}

impl Serializer for u64 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u64()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self);
    }

    fn size(&self) -> usize {
        8
    }
}

impl Serializer for u128 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u128()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u128(self);
    }

    fn size(&self) -> usize {
        16
    }
}

impl Serializer for i16 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_i16()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_i16(*self);
    }

    fn size(&self) -> usize {
        2
    }
}

impl Serializer for i64 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_i64()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_i64(self);
    }

    fn size(&self) -> usize {
        8
    }
}

impl Serializer for bool {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bool()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bool(*self);
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for String {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_string()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_string(self);
    }

    fn size(&self) -> usize {
        2 + self.len()
    }
}

impl<T: Serializer> Serializer for Option<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        if reader.read_bool()? {
            Ok(Some(T::read(reader)?))
        } else {
            Ok(None)
        }
    }

    fn write(&self, writer: &mut Writer) {
        match self {
            Some(value) => {
                writer.write_bool(true);
                value.write(writer);
            }
            None => writer.write_bool(false),
        }
    }

    fn size(&self) -> usize {
        1 + self.as_ref().map_or(0, |v| v.size())
    }
}

impl<T: Serializer> Serializer for Vec<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u16()? as usize;
        let mut values = Vec::with_capacity(len.min(MAX_ITEMS_COLLECTION));
        for _ in 0..len {
            values.push(T::read(reader)?);
        }
        Ok(values)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.len() as u16);
        for value in self {
            value.write(writer);
        }
    }

    fn size(&self) -> usize {
        2 + self.iter().map(|v| v.size()).sum::<usize>()
    }
}

impl<T: Serializer + StdHash + Eq> Serializer for IndexSet<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u16()? as usize;
        let mut values = IndexSet::with_capacity(len.min(MAX_ITEMS_COLLECTION));
        for _ in 0..len {
            if !values.insert(T::read(reader)?) {
                return Err(ReaderError::InvalidValue);
            }
        }
        Ok(values)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.len() as u16);
        for value in self {
            value.write(writer);
        }
    }

    fn size(&self) -> usize {
        2 + self.iter().map(|v| v.size()).sum::<usize>()
    }
}

impl<T: Serializer + StdHash + Eq> Serializer for HashSet<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u16()? as usize;
        let mut values = HashSet::with_capacity(len.min(MAX_ITEMS_COLLECTION));
        for _ in 0..len {
            if !values.insert(T::read(reader)?) {
                return Err(ReaderError::InvalidValue);
            }
        }
        Ok(values)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.len() as u16);
        for value in self {
            value.write(writer);
        }
    }

    fn size(&self) -> usize {
        2 + self.iter().map(|v| v.size()).sum::<usize>()
    }
}

impl<T: Serializer + Clone> Serializer for Cow<'_, T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Cow::Owned(T::read(reader)?))
    }

    fn write(&self, writer: &mut Writer) {
        self.as_ref().write(writer);
    }

    fn size(&self) -> usize {
        self.as_ref().size()
    }
}

impl Serializer for SocketAddr {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let ip = match reader.read_u8()? {
            0 => IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(
                reader.read_bytes_ref(4)?,
            )?)),
            1 => IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(
                reader.read_bytes_ref(16)?,
            )?)),
            _ => return Err(ReaderError::InvalidValue),
        };
        let port = reader.read_u16()?;
        Ok(SocketAddr::new(ip, port))
    }

    fn write(&self, writer: &mut Writer) {
        match self.ip() {
            IpAddr::V4(ip) => {
                writer.write_u8(0);
                writer.write_bytes(&ip.octets());
            }
            IpAddr::V6(ip) => {
                writer.write_u8(1);
                writer.write_bytes(&ip.octets());
            }
        }
        writer.write_u16(self.port());
    }

    fn size(&self) -> usize {
        let ip = match self.ip() {
            IpAddr::V4(_) => 4,
            IpAddr::V6(_) => 16,
        };
        1 + ip + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Serializer + PartialEq + std::fmt::Debug>(value: T) {
        let bytes = value.to_bytes();
        assert_eq!(bytes.len(), value.size());
        let decoded = T::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_primitives_roundtrip() {
        roundtrip(42u8);
        roundtrip(0xBEEFu16);
        roundtrip(0xDEADBEEFu32);
        roundtrip(u64::MAX);
        roundtrip(-1i64);
        roundtrip(i16::MIN);
        roundtrip(true);
        roundtrip("hello".to_string());
    }

    #[test]
    fn test_option_roundtrip() {
        roundtrip(Some(7u64));
        roundtrip(Option::<u64>::None);
    }

    #[test]
    fn test_vec_roundtrip() {
        roundtrip(vec![1u32, 2, 3]);
        roundtrip(Vec::<u32>::new());
    }

    #[test]
    fn test_socket_addr_roundtrip() {
        roundtrip("127.0.0.1:2125".parse::<SocketAddr>().unwrap());
        roundtrip("[::1]:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_truncated_input() {
        let bytes = 0xDEADBEEFu32.to_bytes();
        assert!(u64::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_invalid_bool() {
        assert!(bool::from_bytes(&[2]).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_u64_roundtrip(value: u64) {
                roundtrip(value);
            }

            #[test]
            fn test_string_roundtrip(value in "[ -~]{0,256}") {
                roundtrip(value);
            }

            #[test]
            fn test_vec_of_options_roundtrip(values in proptest::collection::vec(any::<Option<u32>>(), 0..64)) {
                roundtrip(values);
            }
        }
    }
}
