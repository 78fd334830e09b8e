use std::rc::Rc;

use crate::data::Attributes;

/// A predicate over the attributes of a map element.
pub type Filter = Rc<dyn Fn(&Attributes) -> bool>;

/// Keeps elements carrying the given tag key, whatever its value.
pub fn tagged(key: &str) -> Filter {
    let key = key.to_string();
    Rc::new(move |attributes| attributes.contains(&key))
}

/// Keeps elements whose tag value for `key` is one of `values`.
pub fn tagged_any(key: &str, values: &[&str]) -> Filter {
    let key = key.to_string();
    let values: Vec<String> = values.iter().map(|value| value.to_string()).collect();
    Rc::new(move |attributes| {
        attributes
            .get(&key)
            .map(|value| values.iter().any(|candidate| candidate == value))
            .unwrap_or(false)
    })
}

/// Keeps elements on the given layer; a missing or unparsable layer tag
/// counts as layer 0.
pub fn on_layer(layer: i32) -> Filter {
    Rc::new(move |attributes| attributes.get_int("layer", 0) == layer)
}

pub fn and(a: Filter, b: Filter) -> Filter {
    Rc::new(move |attributes| a(attributes) && b(attributes))
}

pub fn not(filter: Filter) -> Filter {
    Rc::new(move |attributes| !filter(attributes))
}
