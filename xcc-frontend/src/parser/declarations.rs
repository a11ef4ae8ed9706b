//! Declaration parsing
//!
//! External declarations, declaration specifiers, declarators (including
//! abstract ones), struct/union/enum specifiers, and parameter lists.
//!
//! Declarator modifiers are collected outermost-first: building the final
//! type folds them over the base type from the innermost end.

use crate::ast::*;
use crate::lexer::TokenType;
use crate::parser::Parser;
use xcc_common::CompilerError;

impl Parser {
    /// Parse one external declaration: a function definition or a
    /// declaration (possibly declaring several names).
    pub(crate) fn parse_external_declaration(&mut self) -> Result<ExternDecl, CompilerError> {
        let specs = self.parse_decln_specs()?;

        // A bare `struct s { ... };` declares only the tag.
        if self.match_token(&TokenType::Semicolon) {
            return Ok(ExternDecl::Decl(Declaration {
                specs,
                declarators: Vec::new(),
            }));
        }

        let declarator = self.parse_declarator()?;

        if self.check(&TokenType::LeftBrace) {
            let body = self.parse_compound_statement()?;
            return Ok(ExternDecl::FuncDef(FuncDef {
                specs,
                declarator,
                body,
            }));
        }

        let decl = self.finish_declaration(specs, declarator)?;
        Ok(ExternDecl::Decl(decl))
    }

    /// Parse a declaration inside a block.
    pub(crate) fn parse_declaration(&mut self) -> Result<Declaration, CompilerError> {
        let specs = self.parse_decln_specs()?;
        if self.match_token(&TokenType::Semicolon) {
            return Ok(Declaration {
                specs,
                declarators: Vec::new(),
            });
        }
        let declarator = self.parse_declarator()?;
        self.finish_declaration(specs, declarator)
    }

    /// Parse the rest of an init-declarator list, the first declarator
    /// already consumed. Registers typedef names.
    fn finish_declaration(
        &mut self,
        specs: DeclnSpecs,
        first: Declarator,
    ) -> Result<Declaration, CompilerError> {
        let mut declarators = Vec::new();

        let initializer = if self.match_token(&TokenType::Equal) {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        declarators.push(InitDeclarator {
            declarator: first,
            initializer,
        });

        while self.match_token(&TokenType::Comma) {
            let declarator = self.parse_declarator()?;
            let initializer = if self.match_token(&TokenType::Equal) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarators.push(InitDeclarator {
                declarator,
                initializer,
            });
        }
        self.expect(TokenType::Semicolon, "declaration")?;

        if specs.storage == Some(StorageClass::Typedef) {
            for init in &declarators {
                if let Some(name) = &init.declarator.name {
                    let name = name.clone();
                    self.add_typedef_name(&name);
                }
            }
        }

        Ok(Declaration { specs, declarators })
    }

    /// Parse declaration specifiers: storage class, qualifiers, and type
    /// specifiers in any order.
    pub(crate) fn parse_decln_specs(&mut self) -> Result<DeclnSpecs, CompilerError> {
        let mut specs = DeclnSpecs::default();

        loop {
            match self.peek().map(|t| t.token_type.clone()) {
                Some(TokenType::Typedef) => {
                    self.set_storage(&mut specs, StorageClass::Typedef)?;
                }
                Some(TokenType::Extern) => {
                    self.set_storage(&mut specs, StorageClass::Extern)?;
                }
                Some(TokenType::Static) => {
                    return Err(self.error_here("'static' storage is not supported"));
                }
                Some(TokenType::Const) => {
                    self.advance();
                    specs.is_const = true;
                }
                Some(TokenType::Volatile) => {
                    self.advance();
                    specs.is_volatile = true;
                }
                Some(TokenType::Void) => self.push_spec(&mut specs, TypeSpec::Void),
                Some(TokenType::Char) => self.push_spec(&mut specs, TypeSpec::Char),
                Some(TokenType::Short) => self.push_spec(&mut specs, TypeSpec::Short),
                Some(TokenType::Int) => self.push_spec(&mut specs, TypeSpec::Int),
                Some(TokenType::Long) => self.push_spec(&mut specs, TypeSpec::Long),
                Some(TokenType::Signed) => self.push_spec(&mut specs, TypeSpec::Signed),
                Some(TokenType::Unsigned) => self.push_spec(&mut specs, TypeSpec::Unsigned),
                Some(TokenType::Float) => self.push_spec(&mut specs, TypeSpec::Float),
                Some(TokenType::Double) => self.push_spec(&mut specs, TypeSpec::Double),
                Some(TokenType::Struct) => {
                    self.advance();
                    let spec = self.parse_struct_spec()?;
                    specs.type_specs.push(TypeSpec::Struct(spec));
                }
                Some(TokenType::Union) => {
                    self.advance();
                    let spec = self.parse_struct_spec()?;
                    specs.type_specs.push(TypeSpec::Union(spec));
                }
                Some(TokenType::Enum) => {
                    self.advance();
                    let spec = self.parse_enum_spec()?;
                    specs.type_specs.push(TypeSpec::Enum(spec));
                }
                Some(TokenType::Identifier(name))
                    if specs.type_specs.is_empty() && self.is_typedef_name(&name) =>
                {
                    self.advance();
                    specs.type_specs.push(TypeSpec::TypedefName(name));
                }
                _ => break,
            }
        }

        Ok(specs)
    }

    fn set_storage(
        &mut self,
        specs: &mut DeclnSpecs,
        storage: StorageClass,
    ) -> Result<(), CompilerError> {
        if specs.storage.is_some() {
            return Err(self.error_here("multiple storage class specifiers"));
        }
        self.advance();
        specs.storage = Some(storage);
        Ok(())
    }

    fn push_spec(&mut self, specs: &mut DeclnSpecs, spec: TypeSpec) {
        self.advance();
        specs.type_specs.push(spec);
    }

    /// Parse what follows `struct` or `union`: a tag, a member list, or
    /// both.
    fn parse_struct_spec(&mut self) -> Result<StructSpec, CompilerError> {
        let tag = match self.peek().map(|t| &t.token_type) {
            Some(TokenType::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let members = if self.match_token(&TokenType::LeftBrace) {
            let mut members = Vec::new();
            while !self.check(&TokenType::RightBrace) {
                members.push(self.parse_struct_member_decl()?);
            }
            self.expect(TokenType::RightBrace, "struct member list")?;
            Some(members)
        } else {
            None
        };

        if tag.is_none() && members.is_none() {
            return Err(self.error_here("struct/union specifier needs a tag or a member list"));
        }
        Ok(StructSpec { tag, members })
    }

    fn parse_struct_member_decl(&mut self) -> Result<StructMemberDecl, CompilerError> {
        let specs = self.parse_decln_specs()?;
        let mut declarators = vec![self.parse_declarator()?];
        while self.match_token(&TokenType::Comma) {
            declarators.push(self.parse_declarator()?);
        }
        self.expect(TokenType::Semicolon, "struct member declaration")?;
        Ok(StructMemberDecl { specs, declarators })
    }

    fn parse_enum_spec(&mut self) -> Result<EnumSpec, CompilerError> {
        let tag = match self.peek().map(|t| &t.token_type) {
            Some(TokenType::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        let enumerators = if self.match_token(&TokenType::LeftBrace) {
            let mut enumerators = Vec::new();
            loop {
                let name = self.expect_identifier("enumerator")?;
                let value = if self.match_token(&TokenType::Equal) {
                    Some(self.parse_conditional()?)
                } else {
                    None
                };
                enumerators.push(Enumerator { name, value });
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                // Trailing comma before the closing brace.
                if self.check(&TokenType::RightBrace) {
                    break;
                }
            }
            self.expect(TokenType::RightBrace, "enumerator list")?;
            Some(enumerators)
        } else {
            None
        };

        if tag.is_none() && enumerators.is_none() {
            return Err(self.error_here("enum specifier needs a tag or an enumerator list"));
        }
        Ok(EnumSpec { tag, enumerators })
    }

    /// Parse a declarator, abstract or named.
    pub(crate) fn parse_declarator(&mut self) -> Result<Declarator, CompilerError> {
        let mut pointers = Vec::new();
        while self.match_token(&TokenType::Star) {
            let mut is_const = false;
            let mut is_volatile = false;
            loop {
                if self.match_token(&TokenType::Const) {
                    is_const = true;
                } else if self.match_token(&TokenType::Volatile) {
                    is_volatile = true;
                } else {
                    break;
                }
            }
            pointers.push(TypeModifier::Pointer {
                is_const,
                is_volatile,
            });
        }

        let (name, mut modifiers) = self.parse_direct_declarator()?;

        // The pointer written closest to the name is the outermost
        // modifier, so the prefix list reverses.
        for pointer in pointers.into_iter().rev() {
            modifiers.push(pointer);
        }

        Ok(Declarator { name, modifiers })
    }

    fn parse_direct_declarator(
        &mut self,
    ) -> Result<(Option<String>, Vec<TypeModifier>), CompilerError> {
        let (name, inner) = match self.peek().map(|t| &t.token_type) {
            Some(TokenType::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                (Some(name), Vec::new())
            }
            Some(TokenType::LeftParen) if self.paren_starts_grouping() => {
                self.advance();
                let declarator = self.parse_declarator()?;
                self.expect(TokenType::RightParen, "parenthesized declarator")?;
                (declarator.name, declarator.modifiers)
            }
            _ => (None, Vec::new()),
        };

        let mut modifiers = inner;
        loop {
            if self.match_token(&TokenType::LeftBracket) {
                let size = if self.check(&TokenType::RightBracket) {
                    None
                } else {
                    Some(Box::new(self.parse_conditional()?))
                };
                self.expect(TokenType::RightBracket, "array declarator")?;
                modifiers.push(TypeModifier::Array(size));
            } else if self.check(&TokenType::LeftParen) {
                self.advance();
                let (params, is_varargs) = self.parse_param_list()?;
                modifiers.push(TypeModifier::Function { params, is_varargs });
            } else {
                break;
            }
        }

        Ok((name, modifiers))
    }

    /// After `(` in a declarator: grouping if a nested declarator can
    /// follow, a parameter list otherwise.
    fn paren_starts_grouping(&self) -> bool {
        match self.peek_type(1) {
            Some(TokenType::Star) | Some(TokenType::LeftParen) | Some(TokenType::LeftBracket) => {
                true
            }
            Some(TokenType::Identifier(name)) => !self.is_typedef_name(name),
            _ => false,
        }
    }

    /// Parse a parameter list after `(`. `()` and `(void)` both mean no
    /// parameters.
    fn parse_param_list(&mut self) -> Result<(Vec<ParamDecl>, bool), CompilerError> {
        if self.match_token(&TokenType::RightParen) {
            return Ok((Vec::new(), false));
        }
        if self.check(&TokenType::Void) && self.peek_type(1) == Some(&TokenType::RightParen) {
            self.advance();
            self.advance();
            return Ok((Vec::new(), false));
        }

        let mut params = Vec::new();
        let mut is_varargs = false;
        loop {
            if self.match_token(&TokenType::Ellipsis) {
                is_varargs = true;
                break;
            }
            let specs = self.parse_decln_specs()?;
            let declarator = self.parse_declarator()?;
            params.push(ParamDecl { specs, declarator });
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RightParen, "parameter list")?;
        Ok((params, is_varargs))
    }

    /// Parse a type name as used in casts and sizeof.
    pub(crate) fn parse_type_name(&mut self) -> Result<TypeName, CompilerError> {
        let specs = self.parse_decln_specs()?;
        let declarator = self.parse_declarator()?;
        Ok(TypeName { specs, declarator })
    }
}
