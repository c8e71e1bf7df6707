use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

/// Treat `null` values as defaults.
///
/// The API server omits most empty fields, but objects written by older
/// clients sometimes carry explicit `null`s (`"annotations": null`).
pub(crate) struct NullAsDefault;

impl<'de, T> DeserializeAs<'de, T> for NullAsDefault
where
    T: Deserialize<'de> + Default,
{
    fn deserialize_as<D>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

impl<T: Serialize> SerializeAs<T> for NullAsDefault {
    fn serialize_as<S>(source: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        source.serialize(serializer)
    }
}

/// Treat empty strings as `None`. An unbound claim may report
/// `"volumeName": ""` instead of leaving the field out.
pub(crate) struct EmptyAsNone;

impl<'de> DeserializeAs<'de, Option<String>> for EmptyAsNone {
    fn deserialize_as<D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;

        Ok(value.filter(|s| !s.is_empty()))
    }
}

impl SerializeAs<Option<String>> for EmptyAsNone {
    fn serialize_as<S>(source: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        source.serialize(serializer)
    }
}
