use serde_json::json;
use serde_json::Value;

/// A seven turn intake conversation, long enough to clear the default report
/// threshold, where the patient introduces themselves by name.
pub fn intake_fixture() -> Vec<(&'static str, &'static str)> {
    return vec![
        ("assistant", "Hello! What is your main health concern or symptom today?"),
        ("user", "My name is Sarah Thompson."),
        ("assistant", "Thank you, Sarah. What brings you in today?"),
        ("user", "I have had stomach pain for about three days."),
        ("assistant", "On a scale from 1 to 10, how severe is it?"),
        ("user", "Around a 6, worse after eating."),
        ("assistant", "Are you taking any medications?"),
    ];
}

/// Wire representation of `intake_fixture`, as the backend expects history.
pub fn intake_fixture_json() -> Value {
    let turns = intake_fixture()
        .into_iter()
        .map(|(role, content)| {
            return json!({ "role": role, "content": content });
        })
        .collect::<Vec<Value>>();

    return Value::Array(turns);
}
