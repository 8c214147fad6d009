//! Member location from selector expressions

use crate::error::{ReflectError, Result};
use crate::expression::{Expr, Selector};
use crate::member::{Lookup, MemberDescriptor};
use crate::type_names;
use crate::types::{type_of, Object, Reflect, TypeInfo};

/// Extract the member a selector reads
///
/// The selector body must be a single member access on the selector's
/// parameter. Two conversions are tolerated: the parameter may be viewed as
/// one of `O`'s base types, and the body may be converted to `V` or to
/// `Object`. So `|s| (s as Person).first_name as Object` selects
/// `first_name`. Anything else (method calls, arithmetic, indexers,
/// chained accesses, other conversions) is rejected.
///
/// The returned descriptor names the type that physically declares the
/// member, also when `O` is a derived type. Restricted members are found
/// as well; compiling them selects the privileged read path.
///
/// # Errors
///
/// - [`ReflectError::InvalidSelector`] if the body is not a direct member
///   access on the parameter
/// - [`ReflectError::MemberNotFound`] if neither `O` nor its bases declare
///   the member
pub fn locate<O: Reflect, V: Reflect>(selector: &Selector<O, V>) -> Result<MemberDescriptor> {
    let lambda = selector.lambda();
    let invalid = |reason: String| ReflectError::InvalidSelector {
        selector: lambda.to_string(),
        reason,
    };

    let body = match &lambda.body {
        Expr::Convert { operand, to } if names_value_type::<V>(to) => operand.as_ref(),
        Expr::Convert { to, .. } => {
            return Err(invalid(format!(
                "the selected value may only be converted to {} or Object, not {}",
                type_names::of::<V>(),
                to
            )));
        }
        body => body,
    };

    let (target, name) = match body {
        Expr::Member { target, name } => (target, name),
        other => return Err(invalid(format!("expected a member access, found a {}", other.kind()))),
    };

    let owner = type_of::<O>();
    let parameter = match target.as_ref() {
        Expr::Convert { operand, to } if owner.lineage().any(|ty| names_type(ty, to)) => operand.as_ref(),
        Expr::Convert { to, .. } => {
            return Err(invalid(format!(
                "the parameter may only be viewed as {} or one of its bases, not {}",
                type_names::get(owner),
                to
            )));
        }
        target => target,
    };

    match parameter {
        Expr::Parameter(p) if *p == lambda.parameter => {}
        Expr::Parameter(p) => {
            return Err(invalid(format!("'{}' is not the selector parameter", p)));
        }
        other => {
            return Err(invalid(format!(
                "'{}' must be accessed on the parameter directly, not on a {}",
                name,
                other.kind()
            )));
        }
    }

    let member = owner
        .member(name, Lookup::IncludeRestricted)
        .ok_or_else(|| ReflectError::MemberNotFound {
            owner: type_names::get(owner),
            member: name.clone(),
        })?;

    let declaring = member.declaring_type();
    Ok(member.reflected_through(declaring))
}

/// Whether a conversion target written in a selector refers to `ty`
fn names_type(ty: &TypeInfo, written: &str) -> bool {
    written == ty.name() || written == type_names::get(ty)
}

fn names_value_type<V: Reflect>(written: &str) -> bool {
    names_type(type_of::<V>(), written) || names_type(type_of::<Object>(), written)
}
