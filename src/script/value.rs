use std::fmt;
use std::rc;

/* Handle to an object registered with script::binding::Bindings. Only
   meaningful to the registry that minted it, and stable for the session. */
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn from_value(v: u64) -> ObjectId {
        ObjectId(v)
    }
}

/* A callable supplied by the scripting runtime. Invoking it produces no
   value; whatever a callback computes stays on the script side. */
#[derive(Clone)]
pub struct ScriptFn(rc::Rc<dyn Fn(&[Value])>);

impl ScriptFn {
    pub fn new<F: Fn(&[Value]) + 'static>(f: F) -> ScriptFn {
        ScriptFn(rc::Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args)
    }
}

impl PartialEq for ScriptFn {
    fn eq(&self, other: &ScriptFn) -> bool {
        rc::Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ScriptFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptFn({:p})", rc::Rc::as_ptr(&self.0))
    }
}

/* Everything that can cross the script boundary. Bridge operations are total
   over these: a value that can't be interpreted becomes the operation's
   sentinel result, never an error. */
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Object(ObjectId),
    Fn(ScriptFn),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_fn(&self) -> Option<&ScriptFn> {
        match self {
            Value::Fn(f) => Some(f),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Value {
        Value::Object(v)
    }
}

impl From<ScriptFn> for Value {
    fn from(v: ScriptFn) -> Value {
        Value::Fn(v)
    }
}

/* None maps to the null sentinel. */
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map_or(Value::Null, T::into)
    }
}
