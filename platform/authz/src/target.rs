use entity::{permissions, roles};

/// Anything that names a role or permission. Strings and loaded models are
/// interchangeable: resolution always compares on `name`.
pub trait Target {
    fn target_name(&self) -> &str;
}

impl Target for str {
    fn target_name(&self) -> &str {
        self
    }
}

impl Target for String {
    fn target_name(&self) -> &str {
        self
    }
}

impl Target for permissions::Model {
    fn target_name(&self) -> &str {
        &self.name
    }
}

impl Target for roles::Model {
    fn target_name(&self) -> &str {
        &self.name
    }
}

impl<T: Target + ?Sized> Target for &T {
    fn target_name(&self) -> &str {
        (**self).target_name()
    }
}

pub(crate) fn target_names<I>(targets: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Target,
{
    targets
        .into_iter()
        .map(|target| target.target_name().to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::prelude::DateTimeUtc;

    #[test]
    fn models_and_strings_resolve_to_the_same_name() {
        let model = permissions::Model {
            id: 7,
            name: "edit articles".into(),
            created_at: DateTimeUtc::default(),
            updated_at: None,
        };
        let owned = String::from("edit articles");
        assert_eq!(model.target_name(), "edit articles");
        assert_eq!((&model).target_name(), owned.target_name());
        assert_eq!("edit articles".target_name(), owned.target_name());
    }

    #[test]
    fn names_are_collected_in_order() {
        assert_eq!(target_names(["b", "a", "b"]), vec!["b", "a", "b"]);
        assert!(target_names(Vec::<String>::new()).is_empty());
    }
}
