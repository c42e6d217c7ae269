use audio_route_manager::config::{ConfigManager, FocusUsage};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Coordinator Configuration Demo");
    println!("==============================");

    // Keep the demo away from the real ~/.config file
    let path = std::env::temp_dir().join("audio-route-manager-demo").join("config.toml");
    let mut config_manager = ConfigManager::with_path(path)?;
    config_manager.reset_to_defaults()?;

    println!("Default configuration:");
    let config = config_manager.get_config();
    println!("  Builder focus from API level: {}", config.builder_focus_min_api_level);
    println!("  Wired enumeration from API level: {}", config.wired_query_min_api_level);
    println!("  Unmute microphone on start: {}", config.unmute_microphone_on_start);
    println!("  SCO poll interval: {:?}", config.sco_poll_interval());
    println!("  Focus usage: {:?}", config.focus.usage);

    println!("\nModifying configuration...");
    config_manager.set_sco_poll_interval(Some(1000))?;
    config_manager.set_accepts_delayed_focus_gain(true)?;
    config_manager.update_config(|config| config.focus.usage = FocusUsage::Media)?;

    println!("Updated configuration:");
    let config = config_manager.get_config();
    println!("  SCO poll interval: {:?}", config.sco_poll_interval());
    println!("  Accepts delayed focus gain: {}", config.focus.accepts_delayed_focus_gain);
    println!("  Focus usage: {:?}", config.focus.usage);

    println!("\nTOML representation:");
    let toml_string = toml::to_string_pretty(config)?;
    println!("{}", toml_string);

    println!("Configuration saved to: {}", config_manager.config_path().display());

    Ok(())
}
