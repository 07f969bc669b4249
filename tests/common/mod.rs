#![allow(dead_code)]

use edge_images::domain::account::Account;
use edge_images::domain::image::{Image, ImageDraft};

pub const SSH_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDFjRxF1E73z1K9AjltDkuJyGUW3YluTEAW6PvHEZH6vnzNHI+cut716lGGRFHlYk1Fk51Q/92ZlynJ/HqByaK/MJppkQSL4x3KEm6s5ciwXbVEb3ct4waTgqxPD9gy7NN0uzbrhQMillb50yZgox6d9A/JmyRA1Dlai/esrlKfZ4wtSUl+CMsPoVxC6pIsh1YqUWE7S/dvXsQ8V+O7H0sdXAkZMg09kLUOQe3fliTMg6wppW+tb30g4MWAbHSrXksL1TpYjmP0M+stNetO2EIZ07bc8KpQhZybdM8LUhhPGuZXuKzIlwbkDI7C1yLv574wOYCjG/zk7Zu9qO7p6u8x valid@sshkey";

pub fn account() -> Account {
    Account::new("6089719").expect("valid account")
}

pub fn image(uuid: &str, status: &str) -> Image {
    Image::new(ImageDraft {
        uuid: uuid.to_string(),
        name: "edge1".to_string(),
        description: "kiosk image".to_string(),
        distribution: "rhel-85".to_string(),
        status: status.to_string(),
        username: "root".to_string(),
        ssh_key: SSH_KEY.to_string(),
        output_types: vec!["rhel-edge-installer".to_string()],
        tags: vec!["kiosk".to_string()],
        packages: vec!["vim-enhanced".to_string()],
        version: 1,
        repos: Vec::new(),
    })
    .expect("valid image")
}
