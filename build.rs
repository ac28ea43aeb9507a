fn main() {
    // Wi-Fi credentials are baked in at compile time via `option_env!`.
    println!("cargo:rerun-if-env-changed=BUILDFLAG_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=BUILDFLAG_WIFI_PASSWORD");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
