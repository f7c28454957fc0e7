/// implement packbytes traits for a bilge bitfield through its underlying integer
#[macro_export]
macro_rules! pack_bilge {
    ($t:ty, $raw:ty) => {
    
        impl packbytes::ToBytes for $t {
            type Bytes = [u8; core::mem::size_of::<$raw>()];
            
            fn to_le_bytes(self) -> Self::Bytes {
                <$raw>::from(self).to_le_bytes()
            }
            fn to_be_bytes(self) -> Self::Bytes {
                <$raw>::from(self).to_be_bytes()
            }
        }
        impl packbytes::FromBytes for $t {
            type Bytes = [u8; core::mem::size_of::<$raw>()];
            
            fn from_le_bytes(bytes: Self::Bytes) -> Self {
                <$t>::from(<$raw>::from_le_bytes(bytes))
            }
            fn from_be_bytes(bytes: Self::Bytes) -> Self {
                <$t>::from(<$raw>::from_be_bytes(bytes))
            }
        }
    };
}

/// implement packbytes traits for a fieldless enum stored as one byte, unknown values fall back to `$fallback`
#[macro_export]
macro_rules! pack_enum {
    ($t:ty, $fallback:expr, [$($variant:expr),* $(,)?]) => {
    
        impl packbytes::ToBytes for $t {
            type Bytes = [u8; 1];
            
            fn to_le_bytes(self) -> Self::Bytes {
                [self as u8]
            }
            fn to_be_bytes(self) -> Self::Bytes {
                [self as u8]
            }
        }
        impl packbytes::FromBytes for $t {
            type Bytes = [u8; 1];
            
            fn from_le_bytes(bytes: Self::Bytes) -> Self {
                [$($variant),*].into_iter()
                    .find(|variant| *variant as u8 == bytes[0])
                    .unwrap_or($fallback)
            }
            fn from_be_bytes(bytes: Self::Bytes) -> Self {
                Self::from_le_bytes(bytes)
            }
        }
    };
}
