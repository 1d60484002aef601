//! Clasificación de valores escritos por una plantilla.
//!
//! Cada valor dinámico se resuelve una única vez, en el punto de
//! escritura, hacia el conjunto cerrado [`Value`]. Los escritores y la
//! máquina de estados de atributos operan exclusivamente sobre esta
//! clasificación.

use std::{
    borrow::Cow,
    fmt::{self, Debug, Display},
    rc::Rc,
    sync::Arc,
};

use crate::{encode::Encoded, Template};

/// Forma resuelta de un valor dinámico.
#[derive(Copy, Clone)]
pub enum Value<'v> {
    /// Ausencia de valor; no produce salida.
    Null,

    /// Booleano. Recibe tratamiento especial en atributos de una sola parte.
    Bool(bool),

    /// Texto crudo, sujeto a codificación.
    Text(&'v str),

    /// Contenido seguro, nunca se codifica.
    Encoded(&'v str),

    /// Otra plantilla, la cual se ejecuta de forma anidada.
    Template(&'v dyn Template),

    /// Cualquier otro valor con representación textual.
    Display(&'v dyn Display),
}

impl Value<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Debug for Value<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => formatter.write_str("Null"),
            Value::Bool(value) => write!(formatter, "Bool({})", value),
            Value::Text(text) => write!(formatter, "Text({:?})", text),
            Value::Encoded(text) => write!(formatter, "Encoded({:?})", text),
            Value::Template(_) => formatter.write_str("Template(..)"),
            Value::Display(value) => write!(formatter, "Display({:?})", value.to_string()),
        }
    }
}

/// Conversión hacia [`Value`].
///
/// Las expresiones de una plantilla deben implementar este trait. Para
/// tipos arbitrarios que implementan [`Display`] existe [`display()`],
/// y para plantillas anidadas existe [`partial()`].
pub trait ToValue {
    fn to_value(&self) -> Value<'_>;
}

impl<'v> ToValue for Value<'v> {
    fn to_value(&self) -> Value<'_> {
        *self
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value<'_> {
        Value::Text(self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value<'_> {
        Value::Text(self)
    }
}

impl ToValue for Cow<'_, str> {
    fn to_value(&self) -> Value<'_> {
        Value::Text(self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value<'_> {
        Value::Bool(*self)
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value<'_> {
        Value::Display(self)
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value<'_> {
        Value::Null
    }
}

impl ToValue for Encoded {
    fn to_value(&self) -> Value<'_> {
        Value::Encoded(self.as_str())
    }
}

impl ToValue for dyn Template + '_ {
    fn to_value(&self) -> Value<'_> {
        Value::Template(self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value<'_> {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }
}

macro_rules! forward_to_value {
    ($($type:ty),*) => {
        $(
            impl<T: ToValue + ?Sized> ToValue for $type {
                fn to_value(&self) -> Value<'_> {
                    (**self).to_value()
                }
            }
        )*
    };
}

forward_to_value!(&T, &mut T, Box<T>, Rc<T>, Arc<T>);

macro_rules! display_to_value {
    ($($type:ty),*) => {
        $(
            impl ToValue for $type {
                fn to_value(&self) -> Value<'_> {
                    Value::Display(self)
                }
            }
        )*
    };
}

display_to_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Escribe un valor cualquiera por medio de su implementación de [`Display`].
pub fn display<T: Display>(value: &T) -> Value<'_> {
    Value::Display(value)
}

/// Escribe una plantilla anidada en la posición actual.
pub fn partial<T: Template>(template: &T) -> Value<'_> {
    Value::Template(template)
}
