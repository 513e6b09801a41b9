//! `wayfarer tools`: List the registered tools.

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = wayfarer_tools::default_registry()?;

    println!("Available tools ({})", registry.len());
    println!();
    for definition in registry.definitions() {
        println!("  {}", definition.name);
        println!("      {}", definition.description);
        if let Some(properties) = definition.parameters["properties"].as_object() {
            let required: Vec<&str> = definition.parameters["required"]
                .as_array()
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            for name in properties.keys() {
                let marker = if required.contains(&name.as_str()) { "required" } else { "optional" };
                println!("      - {name} ({marker})");
            }
        }
        println!();
    }

    Ok(())
}
