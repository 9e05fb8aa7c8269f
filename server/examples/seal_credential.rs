use tandem_server::vault::Vault;

fn main() {
    let mut args = std::env::args().skip(1);
    let key = args
        .next()
        .expect("Usage: seal_credential <hex-key> <plaintext>");
    let plaintext = args
        .next()
        .expect("Usage: seal_credential <hex-key> <plaintext>");

    let vault = Vault::from_hex_key(&key).expect("Invalid vault key");
    let sealed = vault.seal(&plaintext).expect("Sealing failed");
    println!("{}", sealed);
}
