use {
    data_encoding::BASE64,
    serde::{de, ser},
    std::{
        fmt,
        marker::PhantomData,
        ops::{Deref, DerefMut},
        str::FromStr,
    },
};

/// Variable-length bytes, serialized as a padded base64 string.
pub type Binary = B64<Vec<u8>>;

/// Fixed-length bytes, serialized as a padded base64 string.
pub type ByteArray<const N: usize> = B64<[u8; N]>;

#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct B64<T>(T);

impl<T> B64<T> {
    pub const fn from_inner(inner: T) -> Self {
        Self(inner)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> B64<T>
where
    T: Default,
{
    pub fn empty() -> Self {
        Self(T::default())
    }
}

impl<T> AsRef<[u8]> for B64<T>
where
    T: AsRef<[u8]>,
{
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<T> Deref for B64<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for B64<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> fmt::Display for B64<T>
where
    T: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&BASE64.encode(self.0.as_ref()))
    }
}

impl<T> fmt::Debug for B64<T>
where
    T: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "B64({})", BASE64.encode(self.0.as_ref()))
    }
}

/// Error returned when parsing a base64 string into a `B64`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum B64Error {
    #[error("invalid base64: {0}")]
    Decode(String),

    #[error("decoded {actual} bytes, which doesn't fit the target type")]
    Length { actual: usize },
}

impl<T> FromStr for B64<T>
where
    T: TryFrom<Vec<u8>>,
{
    type Err = B64Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = BASE64
            .decode(s.as_bytes())
            .map_err(|err| B64Error::Decode(err.to_string()))?;
        let actual = bytes.len();

        T::try_from(bytes)
            .map(Self)
            .map_err(|_| B64Error::Length { actual })
    }
}

impl<T> ser::Serialize for B64<T>
where
    T: AsRef<[u8]>,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_str(&BASE64.encode(self.0.as_ref()))
    }
}

impl<'de, T> de::Deserialize<'de> for B64<T>
where
    T: TryFrom<Vec<u8>>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_str(B64Visitor::<T>(PhantomData))
    }
}

struct B64Visitor<T>(PhantomData<T>);

impl<T> de::Visitor<'_> for B64Visitor<T>
where
    T: TryFrom<Vec<u8>>,
{
    type Value = B64<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a padded base64 string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        v.parse().map_err(E::custom)
    }
}

// -------------------------------- conversions --------------------------------

impl<const N: usize> From<[u8; N]> for B64<[u8; N]> {
    fn from(array: [u8; N]) -> Self {
        Self(array)
    }
}

impl From<Vec<u8>> for Binary {
    fn from(vec: Vec<u8>) -> Self {
        Self(vec)
    }
}

impl From<&[u8]> for Binary {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl From<&str> for Binary {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl<const N: usize> From<B64<[u8; N]>> for Binary {
    fn from(array: B64<[u8; N]>) -> Self {
        Self(array.0.to_vec())
    }
}

impl<const N: usize> TryFrom<&[u8]> for B64<[u8; N]> {
    type Error = B64Error;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        <[u8; N]>::try_from(slice)
            .map(Self)
            .map_err(|_| B64Error::Length {
                actual: slice.len(),
            })
    }
}

// ----------------------------------- tests -----------------------------------
