use gatekeeper_config::GatekeeperConfig;
use schemars::schema_for;

pub fn main() {
  println!("⚙️ Generating JSON schema for Gatekeeper config file...");
  let schema = schema_for!(GatekeeperConfig);
  // @expected: 👇
  let as_string = serde_json::to_string_pretty(&schema).unwrap();
  println!("✏️ Writing to: libs/config/gatekeeper.schema.json");
  // @expected: 👇
  std::fs::write("libs/config/gatekeeper.schema.json", as_string).unwrap();
  println!("✅ Done");
}
