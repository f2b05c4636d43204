//! Registry construction from declarative `docshift.yml` migrations

use crate::error::{MigrationError, MigrationResult};
use crate::registry::{boxed_factory, MigrationRegistry, RegistryBuilder, UnitFactory};
use crate::templates::{
    AddFieldIfAbsent, BackfillFromParent, DropCollection, DropIndex, RemoveField,
    RenameCollection, RenameDiscriminator, RenameField,
};
use ds_core::{MigrationDef, MigrationStep};

/// Factory producing the template unit a step describes
pub fn unit_factory(step: &MigrationStep) -> UnitFactory {
    match step.clone() {
        MigrationStep::AddField {
            collection,
            field,
            value,
        } => boxed_factory(move || {
            AddFieldIfAbsent::new(collection.clone(), field.clone(), value.clone())
        }),
        MigrationStep::BackfillFromParent {
            collection,
            foreign_key,
            parent_collection,
            parent_key,
            target_field,
            parent_field,
        } => boxed_factory(move || {
            let unit = BackfillFromParent::new(
                collection.clone(),
                foreign_key.clone(),
                parent_collection.clone(),
                parent_key.clone(),
                target_field.clone(),
            );
            match &parent_field {
                Some(field) => unit.with_parent_field(field.clone()),
                None => unit,
            }
        }),
        MigrationStep::RenameDiscriminator {
            collection,
            discriminator_field,
            from,
            to,
            class_name,
        } => boxed_factory(move || {
            let unit = RenameDiscriminator::new(
                collection.clone(),
                discriminator_field.clone(),
                from.clone(),
                to.clone(),
            );
            match &class_name {
                Some(mapping) => unit.with_class_name(mapping.clone()),
                None => unit,
            }
        }),
        MigrationStep::RenameField {
            collection,
            from,
            to,
        } => {
            let unit = RenameField {
                collection,
                from,
                to,
            };
            boxed_factory(move || unit.clone())
        }
        MigrationStep::RemoveField { collection, field } => {
            let unit = RemoveField { collection, field };
            boxed_factory(move || unit.clone())
        }
        MigrationStep::DropCollection { collection } => {
            let unit = DropCollection { collection };
            boxed_factory(move || unit.clone())
        }
        MigrationStep::RenameCollection { from, to } => {
            let unit = RenameCollection { from, to };
            boxed_factory(move || unit.clone())
        }
        MigrationStep::DropIndex { collection, index } => {
            let unit = DropIndex { collection, index };
            boxed_factory(move || unit.clone())
        }
    }
}

/// Reject definitions that parse but describe an operation that cannot work
pub fn validate_def(def: &MigrationDef) -> MigrationResult<()> {
    let problem = match &def.step {
        MigrationStep::RenameField { from, to, .. } if from == to => {
            Some(format!("field '{from}' is renamed to itself"))
        }
        MigrationStep::RenameField { from, to, .. } if from.overlaps(to) => {
            Some(format!("field '{from}' and '{to}' overlap"))
        }
        MigrationStep::RenameCollection { from, to } if from == to => {
            Some(format!("collection '{from}' is renamed to itself"))
        }
        MigrationStep::RenameDiscriminator {
            from,
            to,
            class_name: None,
            ..
        } if from == to => Some(format!(
            "discriminator '{from}' is renamed to itself without a class_name mapping"
        )),
        MigrationStep::BackfillFromParent {
            foreign_key,
            target_field,
            ..
        } if foreign_key == target_field => Some(format!(
            "target_field '{target_field}' is also the foreign_key"
        )),
        MigrationStep::AddField { field, .. }
        | MigrationStep::RemoveField { field, .. }
            if field.is_id() =>
        {
            Some("the _id field cannot be changed".to_string())
        }
        _ => None,
    };
    match problem {
        Some(message) => Err(MigrationError::Configuration {
            name: def.name.to_string(),
            message,
        }),
        None => Ok(()),
    }
}

/// Append declarative definitions to an existing builder
pub fn register_all(
    mut builder: RegistryBuilder,
    defs: &[MigrationDef],
) -> MigrationResult<RegistryBuilder> {
    for def in defs {
        validate_def(def)?;
        log::debug!(
            "Registering {} {} ({})",
            def.sequence,
            def.name,
            def.step.kind()
        );
        builder = builder.register_boxed(
            def.sequence.get(),
            def.name.as_str(),
            unit_factory(&def.step),
        );
    }
    Ok(builder)
}

/// Build a registry holding exactly the given definitions
pub fn registry_from_defs(defs: &[MigrationDef]) -> MigrationResult<MigrationRegistry> {
    register_all(MigrationRegistry::builder(), defs)?.build()
}

#[cfg(test)]
#[path = "declarative_test.rs"]
mod tests;
