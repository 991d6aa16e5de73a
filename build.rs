fn main() {
    println!("cargo:rerun-if-env-changed=SONOTIFY_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=SONOTIFY_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=SONOTIFY_TABLE_URL");
    println!("cargo:rerun-if-env-changed=SONOTIFY_WEBHOOK_URL");
    println!("cargo:rerun-if-env-changed=SONOTIFY_TARGET_DEVICE");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
