fn main() {
    qp::app::startup::startup();
}
