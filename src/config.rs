use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{fs::File, io::BufReader};

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7380,
            db_path: "bower.db".to_string(),
        }
    }
}

impl Config {
    fn load() -> Self {
        match File::open("config.json") {
            Ok(file) => serde_json::from_reader(BufReader::new(file))
                .expect("config.json is not valid config"),
            Err(_) => Config::default(),
        }
    }
}
