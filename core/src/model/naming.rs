/// Hands out the unique node names of a `Function`.
///
/// Names are the operation type name suffixed with a sequence number local
/// to the owning function: `Add_0`, `Constant_1`...
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    next: usize,
}

impl NameGenerator {
    pub fn next_name(&mut self, type_name: &str) -> String {
        let name = format!("{}_{}", type_name, self.next);
        self.next += 1;
        name
    }
}
