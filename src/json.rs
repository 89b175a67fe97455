use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::{
    document::Document,
    value::{Instance, Value},
};

/// Keyed instances currently being written, outermost first.
type Path = Vec<(String, String)>;

impl Document {
    /// JSON projection: globals first, then one array per keyed struct.
    ///
    /// References are inlined as the full target object. A reference back to
    /// an object already being written is emitted as its primary-key value.
    /// Unkeyed structs have no top-level entry.
    pub fn as_json(&self) -> JsonValue {
        let mut map = Map::new();
        let mut path = Path::new();
        for (name, value) in self.globals() {
            map.insert(name.clone(), self.value_to_json(value, &mut path));
        }
        for (name, def) in self.structs() {
            let Some(primary) = def.primary_key_field() else {
                continue;
            };
            let instances = self
                .instances(name)
                .iter()
                .map(|instance| {
                    let key = instance
                        .get_attribute(&primary.name)
                        .map(Value::key_text)
                        .unwrap_or_default();
                    path.push((name.clone(), key));
                    let json = self.instance_to_json(instance, &mut path);
                    path.pop();
                    json
                })
                .collect();
            map.insert(name.clone(), JsonValue::Array(instances));
        }
        JsonValue::Object(map)
    }

    /// Pretty-printed [`Document::as_json`].
    pub fn to_json_string(&self) -> String {
        format!("{:#}", self.as_json())
    }

    fn instance_to_json(&self, instance: &Instance, path: &mut Path) -> JsonValue {
        let mut map = Map::new();
        for (name, value) in instance.attributes() {
            map.insert(name.clone(), self.value_to_json(value, path));
        }
        JsonValue::Object(map)
    }

    fn value_to_json(&self, value: &Value, path: &mut Path) -> JsonValue {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(v) => JsonValue::Bool(*v),
            Value::Int(v) => JsonValue::from(*v),
            Value::Float(v) => JsonValue::from(*v),
            Value::String(s) => JsonValue::from(s.value.clone()),
            Value::Date(v) | Value::Time(v) | Value::DateTime(v) => JsonValue::from(v.clone()),
            Value::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.value_to_json(item, path))
                    .collect(),
            ),
            Value::Instance(instance) => self.instance_to_json(instance, path),
            Value::Reference(reference) => {
                let entry = (reference.struct_name.clone(), reference.key_text());
                if path.contains(&entry) {
                    return self.value_to_json(&reference.key, path);
                }
                match self.dereference(reference) {
                    Some(target) => {
                        path.push(entry);
                        let json = self.instance_to_json(target, path);
                        path.pop();
                        json
                    }
                    None => JsonValue::Null,
                }
            }
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use crate::loads;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reference_cycles_fall_back_to_keys() {
        let doc = loads(
            r#"
            struct Node { *id: str, ?next: Node }
            Node("a"): { next: Node("b") }
            Node("b"): { next: Node("a") }
            Node("c"): { next: Node("c") }
            "#,
        )
        .unwrap();
        assert_eq!(
            doc.as_json(),
            json!({
                "Node": [
                    {"id": "a", "next": {"id": "b", "next": "a"}},
                    {"id": "b", "next": {"id": "a", "next": "b"}},
                    {"id": "c", "next": "c"}
                ]
            })
        );
    }

    #[test]
    fn keyed_structs_without_instances_still_appear() {
        let doc = loads("struct Empty { *id: int }\nstruct Loose { x: int }\nflag: true").unwrap();
        assert_eq!(doc.as_json(), json!({"flag": true, "Empty": []}));
    }

    #[test]
    fn serialization_is_repeatable() {
        let source = "struct P { *id: int, name: str }\nP(2): { name: \"two\" }\nP(1): { name: \"one\" }\nlead: P(1)";
        let doc = loads(source).unwrap();
        let first = doc.to_json_string();
        assert_eq!(first, doc.to_json_string());
        assert_eq!(first, loads(source).unwrap().to_json_string());
        assert_eq!(serde_json::to_value(&doc).unwrap(), doc.as_json());
        assert_eq!(
            doc.as_json(),
            json!({
                "lead": {"id": 1, "name": "one"},
                "P": [{"id": 2, "name": "two"}, {"id": 1, "name": "one"}]
            })
        );
    }
}
