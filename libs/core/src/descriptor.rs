//! JVM-style type and method descriptors.
//!
//! Descriptors are parsed once into structured form and rendered back on
//! demand, so class references buried inside a descriptor can be remapped
//! without string surgery.

use std::fmt::{self, Display, Formatter, Write};

use crate::ident::{ClassIdentifier, MalformedIdentifier};

/// The element type of a descriptor, before array dimensions.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Void,
    Object(ClassIdentifier),
}
impl BaseType {
    fn code(&self) -> char {
        match *self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
            BaseType::Void => 'V',
            BaseType::Object(_) => 'L',
        }
    }
}

/// A field or parameter type: a base type plus array dimensions.
///
/// `Void` is only valid as a bare return type, never as an array element.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TypeDescriptor {
    dims: usize,
    base: BaseType,
}
impl TypeDescriptor {
    pub fn new(base: BaseType, dims: usize) -> TypeDescriptor {
        TypeDescriptor { dims, base }
    }
    pub fn parse(text: &str) -> Result<TypeDescriptor, MalformedIdentifier> {
        let mut cursor = Cursor::new(text);
        let result = cursor.read_type(false)?;
        if cursor.finished() {
            Ok(result)
        } else {
            Err(MalformedIdentifier::TypeDescriptor(text.into()))
        }
    }
    #[inline]
    pub fn base(&self) -> &BaseType {
        &self.base
    }
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }
    /// The referenced class, if the element type is an object type.
    pub fn class(&self) -> Option<&ClassIdentifier> {
        match self.base {
            BaseType::Object(ref id) => Some(id),
            _ => None,
        }
    }
    /// Rebuilds this descriptor with its class reference (if any) passed
    /// through `remap`. Types `remap` declines are kept as-is.
    pub fn map_class<F>(&self, remap: &F) -> TypeDescriptor
    where
        F: Fn(&ClassIdentifier) -> Option<ClassIdentifier>,
    {
        match self.base {
            BaseType::Object(ref id) => match remap(id) {
                Some(renamed) => TypeDescriptor { dims: self.dims, base: BaseType::Object(renamed) },
                None => self.clone(),
            },
            _ => self.clone(),
        }
    }
    fn render(&self, out: &mut String) {
        for _ in 0..self.dims {
            out.push('[');
        }
        out.push(self.base.code());
        if let BaseType::Object(ref id) = self.base {
            out.push_str(&id.full_name());
            out.push(';');
        }
    }
}
impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out);
        f.write_str(&out)
    }
}

/// A method signature: parameter types plus a return type.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MethodDescriptor {
    params: Vec<TypeDescriptor>,
    ret: TypeDescriptor,
}
impl MethodDescriptor {
    pub fn new(params: Vec<TypeDescriptor>, ret: TypeDescriptor) -> MethodDescriptor {
        MethodDescriptor { params, ret }
    }
    pub fn parse(text: &str) -> Result<MethodDescriptor, MalformedIdentifier> {
        let invalid = || MalformedIdentifier::TypeDescriptor(text.into());
        let mut cursor = Cursor::new(text);
        if cursor.next() != Some('(') {
            return Err(invalid());
        }
        let mut params = Vec::new();
        loop {
            match cursor.peek() {
                Some(')') => {
                    cursor.next();
                    break;
                }
                Some(_) => params.push(cursor.read_type(false)?),
                None => return Err(invalid()),
            }
        }
        let ret = cursor.read_type(true)?;
        if cursor.finished() {
            Ok(MethodDescriptor { params, ret })
        } else {
            Err(invalid())
        }
    }
    #[inline]
    pub fn params(&self) -> &[TypeDescriptor] {
        &self.params
    }
    #[inline]
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.ret
    }
    /// Every class referenced by a parameter or the return type.
    pub fn referenced_classes(&self) -> impl Iterator<Item = &ClassIdentifier> {
        self.params
            .iter()
            .chain(::std::iter::once(&self.ret))
            .filter_map(TypeDescriptor::class)
    }
    /// Rebuilds the descriptor with every class reference passed through
    /// `remap`.
    pub fn map_classes<F>(&self, remap: F) -> MethodDescriptor
    where
        F: Fn(&ClassIdentifier) -> Option<ClassIdentifier>,
    {
        MethodDescriptor {
            params: self.params.iter().map(|t| t.map_class(&remap)).collect(),
            ret: self.ret.map_class(&remap),
        }
    }
}
impl Display for MethodDescriptor {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut out = String::from("(");
        for param in &self.params {
            param.render(&mut out);
        }
        out.push(')');
        self.ret.render(&mut out);
        f.write_str(&out)
    }
}

struct Cursor<'a> {
    text: &'a str,
    remaining: ::std::str::Chars<'a>,
}
impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Cursor<'a> {
        Cursor { text, remaining: text.chars() }
    }
    fn peek(&self) -> Option<char> {
        self.remaining.clone().next()
    }
    fn next(&mut self) -> Option<char> {
        self.remaining.next()
    }
    fn finished(&self) -> bool {
        self.remaining.as_str().is_empty()
    }
    fn invalid(&self) -> MalformedIdentifier {
        MalformedIdentifier::TypeDescriptor(self.text.into())
    }
    fn read_type(&mut self, allow_void: bool) -> Result<TypeDescriptor, MalformedIdentifier> {
        let mut dims = 0;
        while self.peek() == Some('[') {
            self.next();
            dims += 1;
        }
        let base = match self.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some('V') if allow_void && dims == 0 => BaseType::Void,
            Some('L') => {
                let rest = self.remaining.as_str();
                let end = rest.find(';').ok_or_else(|| self.invalid())?;
                let id = ClassIdentifier::parse(&rest[..end])
                    .map_err(|_| self.invalid())?;
                self.remaining = rest[(end + 1)..].chars();
                BaseType::Object(id)
            }
            _ => return Err(self.invalid()),
        };
        Ok(TypeDescriptor { dims, base })
    }
}

/// Renders `descriptor` with every class reference passed through `remap`,
/// without allocating intermediate identifier structures.
pub fn rendered_with<F>(descriptor: &MethodDescriptor, remap: F) -> String
where
    F: Fn(&ClassIdentifier) -> Option<ClassIdentifier>,
{
    let mut out = String::new();
    // Infallible: writing to a String can't fail.
    let _ = write!(out, "{}", descriptor.map_classes(remap));
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_types() {
        let t = TypeDescriptor::parse("I").unwrap();
        assert_eq!(*t.base(), BaseType::Int);
        assert_eq!(t.dims(), 0);
        assert_eq!(t.to_string(), "I");
    }

    #[test]
    fn array_types() {
        let t = TypeDescriptor::parse("[[Lnet/minecraft/Entity;").unwrap();
        assert_eq!(t.dims(), 2);
        assert_eq!(t.class().unwrap().full_name(), "net/minecraft/Entity");
        assert_eq!(t.to_string(), "[[Lnet/minecraft/Entity;");
    }

    #[test]
    fn rejects_garbage() {
        assert!(TypeDescriptor::parse("").is_err());
        assert!(TypeDescriptor::parse("X").is_err());
        assert!(TypeDescriptor::parse("V").is_err());
        assert!(TypeDescriptor::parse("Lunterminated").is_err());
        assert!(TypeDescriptor::parse("II").is_err());
    }

    #[test]
    fn method_roundtrip() {
        let desc = MethodDescriptor::parse("(Ljava/lang/String;[IZ)Ljava/util/List;").unwrap();
        assert_eq!(desc.params().len(), 3);
        assert_eq!(desc.to_string(), "(Ljava/lang/String;[IZ)Ljava/util/List;");
        let classes: Vec<String> = desc
            .referenced_classes()
            .map(ClassIdentifier::full_name)
            .collect();
        assert_eq!(classes, vec!["java/lang/String", "java/util/List"]);
    }

    #[test]
    fn void_only_as_return() {
        assert!(MethodDescriptor::parse("()V").is_ok());
        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("()[V").is_err());
    }

    #[test]
    fn remaps_classes() {
        let desc = MethodDescriptor::parse("(La/Foo;I)La/Foo$Inner;").unwrap();
        let mapped = desc.map_classes(|id| {
            if id.full_name() == "a/Foo" {
                Some(ClassIdentifier::parse("b/Bar").unwrap())
            } else {
                None
            }
        });
        assert_eq!(mapped.to_string(), "(Lb/Bar;I)La/Foo$Inner;");
    }
}
