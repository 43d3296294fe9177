fn main() {
    chatfree::run()
}
