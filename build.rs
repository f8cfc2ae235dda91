fn main() {
    // ESP-IDF environment propagation is only needed for on-target builds.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
