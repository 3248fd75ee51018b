fn main() {
    // ESP-IDF environment is only needed for the firmware binary; host
    // builds of the library and its tests skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
