//! Code for handling IDs
use anyhow::{Context, Result};
use indexmap::IndexSet;

/// A trait alias for ID types
pub trait IDLike:
    Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}
impl<T> IDLike for T where
    T: Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `LocationID`, `ComponentID`, etc.)
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }
        }
    };
}
pub(crate) use define_id_type;

#[cfg(test)]
define_id_type!(GenericID);

/// Indicates that the struct has an ID field
pub trait HasID<ID: IDLike> {
    /// Get the struct's ID
    fn get_id(&self) -> &ID;
}

/// Implement the `HasID` trait for the given type, assuming it has a field called `id`
macro_rules! define_id_getter {
    ($t:ty, $id_ty:ty) => {
        impl crate::id::HasID<$id_ty> for $t {
            fn get_id(&self) -> &$id_ty {
                &self.id
            }
        }
    };
}
pub(crate) use define_id_getter;

/// A set of known IDs which other data refers to
pub trait IDCollection<ID: IDLike> {
    /// Look up an ID, returning the stored copy or an error if it is unknown
    fn get_id(&self, id: &ID) -> Result<ID>;

    /// Check that every given ID is known
    fn check_ids<'a, I>(&self, ids: I) -> Result<()>
    where
        ID: 'a,
        I: IntoIterator<Item = &'a ID>,
    {
        for id in ids {
            self.get_id(id)?;
        }

        Ok(())
    }
}

impl<ID: IDLike> IDCollection<ID> for IndexSet<ID> {
    fn get_id(&self, id: &ID) -> Result<ID> {
        let found = self
            .get(id.borrow())
            .with_context(|| format!("Unknown ID {id} found"))?;
        Ok(found.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn ids() -> IndexSet<GenericID> {
        ["north".into(), "south".into()].into_iter().collect()
    }

    #[test]
    fn test_get_id() {
        assert_eq!(ids().get_id(&"south".into()).unwrap(), GenericID::new("south"));
        assert_error!(ids().get_id(&"east".into()), "Unknown ID east found");
    }

    #[test]
    fn test_check_ids() {
        let known = [GenericID::new("north")];
        assert!(ids().check_ids(&known).is_ok());
        let unknown = [GenericID::new("north"), GenericID::new("west")];
        assert_error!(ids().check_ids(&unknown), "Unknown ID west found");
    }
}
